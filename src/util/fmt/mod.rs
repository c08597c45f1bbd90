use crate::util::intern::Names;

pub mod error;
pub mod schema;
pub mod tree;

pub struct Context<'a> {
    pub names: &'a Names,
    /// Shown as the prefix of alternate-form diagnostics.
    pub file: &'a str,
}

/// Analogous to [`std::fmt::Display`], but also contains the compilation
/// context, such as the current [`Names`].
pub trait Show {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result;

    /// Returns a type which can be displayed.
    fn display(&self, ctx: &Context<'_>) -> impl std::fmt::Display
    where
        Self: Sized,
    {
        Display(self, ctx)
    }
}

struct Display<'this, 'ctx, 'a, T: Show>(&'this T, &'ctx Context<'a>);

impl<T> std::fmt::Display for Display<'_, '_, '_, T>
where
    T: Show,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Display(this, ctx) = self;
        this.show(f, ctx)
    }
}
