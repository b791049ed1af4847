use crate::config::BackendKind;
use crate::endpoint;
use crate::engine::eslint::EslintCli;
use crate::engine::prettier::PrettierCli;
use crate::engine::tsfmt::TsFmtCli;
use crate::engine::{LintEngine, StyleEngine, TsFmtEngine};

use std::fmt::{Debug, Formatter, Result as FormatResult};
use std::path::Path;
use std::sync::Arc;

use axum::Router;

/// The formatter capability an instance serves. Exactly one per process.
#[derive(Clone)]
pub enum Backend {
    Prettier(Arc<dyn StyleEngine>),
    Eslint(Arc<dyn LintEngine>),
    TsFmt(Arc<dyn TsFmtEngine>),
}

impl Backend {
    /// Engines driving the tool installed under `node_project_dir` (or on `PATH`).
    pub fn process_backed(kind: BackendKind, node_project_dir: &Path) -> Self {
        match kind {
            BackendKind::Prettier => Backend::Prettier(Arc::new(PrettierCli::new(node_project_dir))),
            BackendKind::Eslint => Backend::Eslint(Arc::new(EslintCli::new(node_project_dir))),
            BackendKind::TsFmt => Backend::TsFmt(Arc::new(TsFmtCli::new(node_project_dir))),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Prettier(_) => BackendKind::Prettier,
            Backend::Eslint(_) => BackendKind::Eslint,
            Backend::TsFmt(_) => BackendKind::TsFmt,
        }
    }

    pub fn router(self) -> Router {
        match self {
            Backend::Prettier(engine) => endpoint::prettier::router(engine),
            Backend::Eslint(engine) => endpoint::eslint::router(engine),
            Backend::TsFmt(engine) => endpoint::tsfmt::router(engine),
        }
    }
}

impl Debug for Backend {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.debug_tuple("Backend").field(&self.kind()).finish()
    }
}
