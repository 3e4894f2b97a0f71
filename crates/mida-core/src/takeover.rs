#![forbid(unsafe_code)]

//! The terminal page takeover.
//!
//! Every visible text leaf under the content root is overwritten with the
//! phrase `DEIMOS IS MISSING`, repeated and cut to the leaf's original length,
//! so the page keeps its shape while losing its words. Protected subtrees,
//! `script`/`style` content, whitespace-only leaves and leaves shorter than
//! [`MIN_REWRITE_LEN`] are left alone. Tokens are then locked.
//!
//! Lengths are measured by [`ContentTree::text_len`], so a DOM-backed tree
//! can count UTF-16 units the way the browser does. The phrase is ASCII, so
//! a fill of `len` chars has `len` units in either measure.

use crate::content::{ContentTree, TextUnit, text_units};
use crate::page::{Page, PageMode, TokenId};

/// The replacement phrase.
pub const PHRASE: &str = "DEIMOS IS MISSING";

/// Leaves shorter than this keep their text.
pub const MIN_REWRITE_LEN: usize = 3;

/// Summary of a takeover pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TakeoverReport {
    /// Text leaves overwritten.
    pub rewritten: usize,
    /// Visible leaves left alone because they were too short.
    pub too_short: usize,
    /// Tokens locked.
    pub locked_tokens: usize,
}

/// `PHRASE` cycled with single-space separators, exactly `len` chars long.
#[must_use]
pub fn phrase_fill(len: usize) -> String {
    PHRASE
        .chars()
        .chain(core::iter::once(' '))
        .cycle()
        .take(len)
        .collect()
}

/// Whether a unit is visible text eligible for the takeover scan.
#[must_use]
pub fn is_visible_text<N>(unit: &TextUnit<N>) -> bool {
    !unit.text.trim().is_empty() && !unit.context.protected && !unit.context.non_renderable
}

/// Run the takeover over `tree` and lock `tokens` on `page`.
pub fn execute<T>(page: &mut dyn Page, tree: &mut T, tokens: &[TokenId]) -> TakeoverReport
where
    T: ContentTree + ?Sized,
{
    let mut report = TakeoverReport::default();

    if let Err(err) = page.set_mode(PageMode::Takeover, true) {
        tracing::warn!(error = %err, "could not set takeover mode");
    }

    for unit in text_units(&*tree, is_visible_text) {
        let len = tree.text_len(&unit.text);
        if len < MIN_REWRITE_LEN {
            report.too_short += 1;
            continue;
        }
        tree.set_text(&unit.node, &phrase_fill(len));
        report.rewritten += 1;
    }

    for &id in tokens {
        match page.lock_token(id) {
            Ok(()) => report.locked_tokens += 1,
            Err(err) => tracing::warn!(token = %id, error = %err, "could not lock token"),
        }
    }

    tracing::info!(
        rewritten = report.rewritten,
        locked = report.locked_tokens,
        "takeover executed"
    );
    report
}
