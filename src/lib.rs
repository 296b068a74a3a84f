pub mod logging;
pub mod lsp;
