use indoc::indoc;
use pretty_assertions::assert_eq;

use crate::{compiler::compile, parser::ParseOptions, util::intern::Names};

fn gen(src: &str) -> String {
    let names = &mut Names::new();
    let analysis = compile(src, names, ParseOptions::default()).expect("failed to compile");
    super::generate(&analysis, names, "demo")
}

#[test]
fn test_full_schema() {
    let src = indoc! {r#"
        package = "demo"
        import "shapes/common.brpc"

        message Point struct (T) {
            required x @1 T;
            optional tags @2 [][4]string;
            deprecated big @3 int100;
            required type @4 Kind;
            message Kind enum { @1 Flat; @2 type; }
        }

        message Shape union {
            @1 Point(float32);
            @2 struct { required r @1 float64; };
        }

        service Draw {
            rpc @1 Render (Shape) returns ([]int9)
        }
    "#};
    let expected = indoc! {r#"
        // Generated from package `demo`. Do not edit.

        pub const PACKAGE: &str = "demo";

        pub use super::common::*;

        #[derive(Clone, Debug, PartialEq)]
        pub struct Point<T> {
            pub x: T,
            pub tags: Option<Vec<[String; 4]>>,
            #[deprecated]
            pub big: Option<num_bigint::BigInt>,
            pub r#type: PointKind,
        }

        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct PointKind(pub u32);

        impl PointKind {
            pub const FLAT: PointKind = PointKind(1);
            pub const TYPE: PointKind = PointKind(2);
        }

        #[derive(Clone, Debug, PartialEq)]
        pub enum Shape {
            Point(Point<f32>),
            Variant2(ShapeVariant2),
        }

        impl Shape {
            /// Ordinal of the active option.
            pub fn ordinal(&self) -> u32 {
                match *self {
                    Self::Point(_) => 1,
                    Self::Variant2(_) => 2,
                }
            }
        }

        #[derive(Clone, Debug, PartialEq)]
        pub struct ShapeVariant2 {
            pub r: f64,
        }

        pub trait Draw {
            fn render(&self, arg: Shape) -> Vec<i16>;
        }
    "#};
    assert_eq!(gen(src), expected);
}

#[test]
fn test_members_follow_ordinals() {
    let src = "message E enum { @2 second_case; @1 FirstCase; }";
    let expected = indoc! {"
        // Generated from package `demo`. Do not edit.

        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct E(pub u32);

        impl E {
            pub const FIRST_CASE: E = E(1);
            pub const SECOND_CASE: E = E(2);
        }
    "};
    assert_eq!(gen(src), expected);
}

#[test]
fn test_inline_and_nested_names() {
    let src = indoc! {"
        message Outer struct {
            required self @1 struct { required fn @1 Map(struct {} Inner); };
            message Inner union (T) {}
        }
        message Map struct (K V) {}
    "};
    let expected = indoc! {"
        // Generated from package `demo`. Do not edit.

        #[derive(Clone, Debug, PartialEq)]
        pub struct Outer {
            pub self_: OuterSelf,
        }

        #[derive(Clone, Debug, PartialEq)]
        pub struct OuterSelf {
            pub r#fn: Map<OuterSelfFnArg1, OuterInner>,
        }

        #[derive(Clone, Debug, PartialEq)]
        pub struct OuterSelfFnArg1 {
        }

        #[derive(Clone, Debug, PartialEq)]
        pub enum OuterInner<T> {
        }

        impl<T> OuterInner<T> {
            /// Ordinal of the active option.
            pub fn ordinal(&self) -> u32 {
                match *self {
                }
            }
        }

        #[derive(Clone, Debug, PartialEq)]
        pub struct Map<K, V> {
        }
    "};
    assert_eq!(gen(src), expected);
}

#[test]
fn test_nested_definitions_inherit_type_params() {
    let src = indoc! {"
        message P struct (T) {
            required q @1 Q;
            required s @2 struct { required x @1 Q; required k @2 Kind; };
            message Q struct { required x @1 T; }
            message Kind enum { @1 A; }
        }
    "};
    let expected = indoc! {"
        // Generated from package `demo`. Do not edit.

        #[derive(Clone, Debug, PartialEq)]
        pub struct P<T> {
            pub q: PQ<T>,
            pub s: PS<T>,
        }

        #[derive(Clone, Debug, PartialEq)]
        pub struct PS<T> {
            pub x: PQ<T>,
            pub k: PKind,
        }

        #[derive(Clone, Debug, PartialEq)]
        pub struct PQ<T> {
            pub x: T,
        }

        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct PKind(pub u32);

        impl PKind {
            pub const A: PKind = PKind(1);
        }
    "};
    assert_eq!(gen(src), expected);
}

#[test]
fn test_colliding_names_get_suffixes() {
    let src = indoc! {"
        message E enum { @1 a; @2 A; @3 b; }
        message U union { @1 Item; @2 item; @3 Self; }
        message Item struct {}
        message item struct {}
        message Self struct {}
    "};
    let expected = indoc! {"
        // Generated from package `demo`. Do not edit.

        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct E(pub u32);

        impl E {
            pub const A_1: E = E(1);
            pub const A_2: E = E(2);
            pub const B: E = E(3);
        }

        #[derive(Clone, Debug, PartialEq)]
        pub enum U {
            Item1(Item),
            Item2(Item2),
            Self_(Self_),
        }

        impl U {
            /// Ordinal of the active option.
            pub fn ordinal(&self) -> u32 {
                match *self {
                    Self::Item1(_) => 1,
                    Self::Item2(_) => 2,
                    Self::Self_(_) => 3,
                }
            }
        }

        #[derive(Clone, Debug, PartialEq)]
        pub struct Item {
        }

        #[derive(Clone, Debug, PartialEq)]
        pub struct Item2 {
        }

        #[derive(Clone, Debug, PartialEq)]
        pub struct Self_ {
        }
    "};
    assert_eq!(gen(src), expected);
}

#[test]
fn test_primitive_spellings() {
    use crate::types::Primitive;

    let spelled: Vec<_> = Primitive::ALL
        .iter()
        .map(|&p| super::primitive_type(p))
        .collect();
    assert_eq!(
        spelled,
        ["String", "bool", "f32", "f64", "i8", "i16", "i32", "i64", "num_bigint::BigInt"]
    );
}
