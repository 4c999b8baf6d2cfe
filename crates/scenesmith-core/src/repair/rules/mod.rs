//! The repair rule catalogue and its fixed application order.

pub mod balance;
pub mod calls;
pub mod structure;
pub mod text;

pub use balance::{BracketBalance, QuoteBalance};
pub use calls::{
    ArgumentOrder, DuplicateKeywords, KeywordRename, LayoutBuffer, ParameterElision,
    ParameterMigration, RangeMigration, ResourceSubstitution, TexDowngrade, DEFAULT_BUFF,
};
pub use structure::{
    BlockIndentation, ImportInjection, NarrationUpgrade, SceneScaffold, SCAFFOLD_CLASS,
};
pub use text::{ColorAlias, FontFamily, FontSizeFloor, MarkdownFence, ProseLines};

use super::RepairRule;

/// The standard pipeline, in application order.
///
/// Text cleanup comes first so that balancing sees only code; balancing
/// precedes every call-level rule because those only rewrite calls whose
/// parentheses match; structural rules run last on the settled text.
pub fn standard_rules(narration: bool) -> Vec<Box<dyn RepairRule>> {
    let mut rules: Vec<Box<dyn RepairRule>> = vec![
        Box::new(MarkdownFence),
        Box::new(ProseLines),
        Box::new(QuoteBalance),
        Box::new(BracketBalance),
        Box::new(ColorAlias),
        Box::new(FontFamily::default()),
        Box::new(ResourceSubstitution),
        Box::new(TexDowngrade),
        Box::new(KeywordRename::default()),
        Box::new(ParameterMigration::default()),
        Box::new(ParameterElision::default()),
        Box::new(DuplicateKeywords),
        Box::new(ArgumentOrder),
        Box::new(FontSizeFloor::default()),
        Box::new(LayoutBuffer),
        Box::new(BlockIndentation),
        Box::new(SceneScaffold),
        Box::new(ImportInjection),
    ];
    if narration {
        rules.push(Box::new(NarrationUpgrade));
    }
    rules
}
