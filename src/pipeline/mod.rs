// Copyright 2026 Portico Contributors
// SPDX-License-Identifier: Apache-2.0

//! Operation pipeline: one entry point per portal dataset.
//!
//! Every operation follows the same arc: open a fresh browser session,
//! attach the capture interceptor, log in, walk the dataset's navigation
//! steps, drain captures, normalize, and tear the session down. Sessions
//! are strictly per-operation; the only thing operations share is the
//! underlying browser process inside the factory.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::browser::chromium::ChromiumFactory;
use crate::browser::{BrowserFactory, PortalSession, SessionOptions};
use crate::capture::{ResponseInterceptor, ResponseStore};
use crate::config::PortalConfig;
use crate::error::{PortalError, PortalResult};
use crate::model::{Credentials, FetchOutcome, LoginOutcome, NavigationStep, RetrievalMethod};
use crate::normalize;
use crate::portal::{login, NavigationOrchestrator};

/// Ceiling on whole-session attempts for the transcript, the one
/// dataset flaky enough to deserve a second try.
pub const TRANSCRIPT_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dataset {
    CurrentGrades,
    Transcript,
    Curriculum,
}

/// Facade over the whole capture pipeline.
pub struct Portal {
    factory: Arc<dyn BrowserFactory>,
    config: PortalConfig,
}

impl Portal {
    /// Portal driven by the shared headless Chromium factory.
    pub fn new(config: PortalConfig) -> Self {
        Self {
            factory: Arc::new(ChromiumFactory::new()),
            config,
        }
    }

    /// Portal driven by an injected browser factory. This is how tests
    /// run the full pipeline against scripted sessions.
    pub fn with_factory(factory: Arc<dyn BrowserFactory>, config: PortalConfig) -> Self {
        Self { factory, config }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Verify credentials by performing a real login, then discard the
    /// session.
    pub async fn login(&self, credentials: &Credentials) -> PortalResult<LoginOutcome> {
        let operation = Uuid::new_v4();
        info!(%operation, "verifying portal credentials");

        let options = SessionOptions::from_config(&self.config);
        let session = self
            .factory
            .session(&options)
            .await
            .map_err(PortalError::connection)?;

        let result = async {
            let store = Arc::new(ResponseStore::new());
            let _interceptor = ResponseInterceptor::attach(
                Arc::clone(&session),
                Arc::clone(&store),
                &self.config.api_marker,
            )
            .await
            .map_err(PortalError::connection)?;
            login::perform(&session, &store, &self.config, credentials).await
        }
        .await;

        close_session(&session).await;
        result.map(|_| LoginOutcome {
            success: true,
            method: RetrievalMethod::Remote,
        })
    }

    /// Fetch the current term's grades. Single attempt; the normalizer
    /// falls back to the transcript when the dedicated listing is empty.
    pub async fn fetch_current_grades(&self, credentials: &Credentials) -> PortalResult<FetchOutcome> {
        let operation = Uuid::new_v4();
        info!(%operation, "fetching current grades");
        self.run_dataset(credentials, Dataset::CurrentGrades).await
    }

    /// Fetch the full transcript, retrying the entire session once when
    /// it comes back empty or fails for connection-class reasons.
    /// Credential rejections and parse failures are never retried.
    pub async fn fetch_transcript(&self, credentials: &Credentials) -> PortalResult<FetchOutcome> {
        let operation = Uuid::new_v4();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let last = attempt >= TRANSCRIPT_ATTEMPTS;
            info!(%operation, attempt, "fetching transcript");
            match self.run_dataset(credentials, Dataset::Transcript).await {
                Ok(mut outcome) if !outcome.data.is_empty() || last => {
                    outcome.attempts = attempt;
                    return Ok(outcome);
                }
                Ok(_) => {
                    warn!(%operation, attempt, "transcript came back empty; retrying with a fresh session");
                }
                Err(PortalError::Authentication) => return Err(PortalError::Authentication),
                Err(err @ PortalError::Parse { .. }) => return Err(err),
                Err(err) if last => return Err(err),
                Err(err) => {
                    warn!(%operation, attempt, error = %err, "transcript attempt failed; retrying");
                }
            }
        }
    }

    /// Fetch the degree curriculum matrix. Single attempt.
    pub async fn fetch_curriculum(&self, credentials: &Credentials) -> PortalResult<FetchOutcome> {
        let operation = Uuid::new_v4();
        info!(%operation, "fetching curriculum");
        self.run_dataset(credentials, Dataset::Curriculum).await
    }

    /// One full browser-session attempt at a dataset. The session is
    /// closed on every exit path, success or not.
    async fn run_dataset(
        &self,
        credentials: &Credentials,
        dataset: Dataset,
    ) -> PortalResult<FetchOutcome> {
        let options = SessionOptions::from_config(&self.config);
        let session = self
            .factory
            .session(&options)
            .await
            .map_err(PortalError::connection)?;
        let result = self.drive_session(&session, credentials, dataset).await;
        close_session(&session).await;
        result
    }

    async fn drive_session(
        &self,
        session: &Arc<dyn PortalSession>,
        credentials: &Credentials,
        dataset: Dataset,
    ) -> PortalResult<FetchOutcome> {
        let store = Arc::new(ResponseStore::new());
        let interceptor = ResponseInterceptor::attach(
            Arc::clone(session),
            Arc::clone(&store),
            &self.config.api_marker,
        )
        .await
        .map_err(PortalError::connection)?;

        login::perform(session, &store, &self.config, credentials).await?;

        let steps = self.steps_for(dataset);
        let orchestrator = NavigationOrchestrator::new(session, &interceptor, &store, &self.config);
        let snapshot = orchestrator.run(&steps).await;

        let (data, raw) = match dataset {
            Dataset::CurrentGrades => normalize::current_grades(&snapshot)?,
            Dataset::Transcript => normalize::transcript(&snapshot)?,
            Dataset::Curriculum => normalize::curriculum(&snapshot, &self.config)?,
        };
        Ok(FetchOutcome {
            method: RetrievalMethod::Remote,
            attempts: 1,
            data,
            raw,
        })
    }

    fn steps_for(&self, dataset: Dataset) -> Vec<NavigationStep> {
        let routes = &self.config.routes;
        match dataset {
            // The transcript visit alongside the grade listing feeds the
            // normalizer's fallback for portals without a dedicated
            // current-term endpoint.
            Dataset::CurrentGrades => vec![
                NavigationStep::to(&routes.grades).expect_capture(normalize::CURRENT_GRADE_PATHS),
                NavigationStep::to(&routes.transcript).expect_capture(normalize::TRANSCRIPT_PATHS),
            ],
            Dataset::Transcript => vec![
                NavigationStep::to(&routes.transcript).expect_capture(normalize::TRANSCRIPT_PATHS),
            ],
            Dataset::Curriculum => vec![
                NavigationStep::to(&routes.curriculum).expect_capture(normalize::CURRICULUM_PATHS),
            ],
        }
    }
}

async fn close_session(session: &Arc<dyn PortalSession>) {
    if let Err(err) = session.close().await {
        warn!(error = %err, "failed to close browser session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_cover_each_dataset() {
        let portal = Portal::new(PortalConfig::default());

        let grades = portal.steps_for(Dataset::CurrentGrades);
        assert_eq!(grades.len(), 2);
        assert_eq!(grades[0].route, "#/boletim");
        assert_eq!(grades[1].route, "#/historico");

        let transcript = portal.steps_for(Dataset::Transcript);
        assert_eq!(transcript.len(), 1);
        assert!(transcript[0]
            .wait_for_keywords
            .contains(&"historico".to_string()));

        let curriculum = portal.steps_for(Dataset::Curriculum);
        assert_eq!(curriculum.len(), 1);
        assert_eq!(curriculum[0].route, "#/matriz-curricular");
    }
}
