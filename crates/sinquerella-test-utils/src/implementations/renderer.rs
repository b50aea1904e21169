//! Report rendering fake.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use sinquerella_core::{CoreError, ReportDocument, ReportRenderer, WorkflowState};

/// Renders the report summary as JSON instead of a PDF
#[derive(Debug, Default)]
pub struct FakeReportRenderer {
    renders: AtomicUsize,
}

impl FakeReportRenderer {
    /// Create a renderer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents rendered
    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportRenderer for FakeReportRenderer {
    async fn render(&self, state: &WorkflowState) -> Result<ReportDocument, CoreError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let content = serde_json::to_vec_pretty(&state.summary())?;
        Ok(ReportDocument {
            file_name: format!("reporte-{}.json", state.session),
            media_type: "application/json".to_string(),
            content,
        })
    }
}
