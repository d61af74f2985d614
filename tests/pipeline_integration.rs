//! End-to-end pipeline tests against scripted browser sessions.
//!
//! No Chromium involved: a fake factory hands the pipeline pre-scripted
//! sessions, and the paused tokio clock fast-forwards every settle delay
//! and poll loop. Each test asserts both the normalized output and the
//! session lifecycle (how many sessions were opened, and that every one
//! of them was closed).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{bail, Result};
use assert_json_diff::assert_json_include;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use portico_runtime::browser::{BrowserFactory, NetResponseEvent, PortalSession, SessionOptions};
use portico_runtime::config::PortalConfig;
use portico_runtime::error::PortalError;
use portico_runtime::model::{CourseKind, CourseStatus, Credentials};
use portico_runtime::pipeline::Portal;

const BASE: &str = "https://portal.example.edu.br";

// ── Scripted browser ─────────────────────────────────────────────────────

/// One canned API response a session surfaces when a matching route is
/// visited.
#[derive(Clone)]
struct Emission {
    /// Substring of the visited URL that triggers the emission.
    trigger: &'static str,
    request_id: &'static str,
    api_path: &'static str,
    body: Value,
}

/// Plays the portal: tracks the current URL, authenticates on the fill
/// script, and emits staged API responses as routes are visited.
struct ScriptedSession {
    accept_login: bool,
    authed: AtomicBool,
    current: StdMutex<String>,
    emissions: Vec<Emission>,
    tx: mpsc::Sender<NetResponseEvent>,
    rx: tokio::sync::Mutex<Option<mpsc::Receiver<NetResponseEvent>>>,
    bodies: StdMutex<HashMap<String, String>>,
    closed: AtomicBool,
}

impl ScriptedSession {
    fn new(accept_login: bool, emissions: Vec<Emission>) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(32);
        let bodies = emissions
            .iter()
            .map(|e| (e.request_id.to_string(), e.body.to_string()))
            .collect();
        Arc::new(Self {
            accept_login,
            authed: AtomicBool::new(false),
            current: StdMutex::new(String::new()),
            emissions,
            tx,
            rx: tokio::sync::Mutex::new(Some(rx)),
            bodies: StdMutex::new(bodies),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl PortalSession for ScriptedSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        *self.current.lock().unwrap() = url.to_string();
        if !self.authed.load(Ordering::SeqCst) {
            return Ok(());
        }
        for e in &self.emissions {
            if url.contains(e.trigger) {
                let _ = self
                    .tx
                    .send(NetResponseEvent {
                        request_id: e.request_id.to_string(),
                        url: format!("{BASE}{}", e.api_path),
                        status: 200,
                    })
                    .await;
            }
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        // The login fill script is the only one that touches password
        // inputs; everything else is the enrollment chooser probe.
        if script.contains("password") {
            if self.accept_login {
                self.authed.store(true, Ordering::SeqCst);
                *self.current.lock().unwrap() = format!("{BASE}/#/home");
            }
            return Ok(json!({"filled": true, "submitted": true}));
        }
        Ok(json!({"found": false, "confirmed": false}))
    }

    async fn responses(&self) -> Result<mpsc::Receiver<NetResponseEvent>> {
        self.rx
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow::anyhow!("stream already taken"))
    }

    async fn response_body(&self, request_id: &str) -> Result<Option<String>> {
        Ok(self.bodies.lock().unwrap().get(request_id).cloned())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out scripted sessions in order; errors when the queue runs dry.
struct ScriptedFactory {
    queue: StdMutex<VecDeque<Arc<ScriptedSession>>>,
    calls: AtomicUsize,
}

impl ScriptedFactory {
    fn new(sessions: Vec<Arc<ScriptedSession>>) -> Arc<Self> {
        Arc::new(Self {
            queue: StdMutex::new(sessions.into_iter().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn portal(self: &Arc<Self>) -> Portal {
        Portal::with_factory(
            Arc::clone(self) as Arc<dyn BrowserFactory>,
            PortalConfig::default(),
        )
    }
}

#[async_trait]
impl BrowserFactory for ScriptedFactory {
    async fn session(&self, _options: &SessionOptions) -> Result<Arc<dyn PortalSession>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.queue.lock().unwrap().pop_front();
        match next {
            Some(s) => Ok(s as Arc<dyn PortalSession>),
            None => bail!("browser process lost"),
        }
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

fn creds() -> Credentials {
    Credentials::new("2023001234", "s3cret-pw")
}

fn transcript_body() -> Value {
    json!({
        "Apresentacao": [
            {
                "CodDisciplina": "60963",
                "NomeDisciplina": "Calculus I",
                "NotaFinal": "7,5",
                "Situacao": "Aprovado",
                "Faltas": "4",
                "CargaHoraria": "60",
                "PeriodoLetivo": "2024/1"
            },
            {
                "CodDisciplina": "60990",
                "NomeDisciplina": "Linear Algebra",
                "NotaFinal": "-",
                "Situacao": "Cursando",
                "Faltas": "0"
            },
            {
                "CodDisciplina": "61010",
                "NomeDisciplina": "Physics I",
                "NotaFinal": "5,0",
                "Situacao": "Reprovado",
                "Faltas": "12"
            }
        ]
    })
}

fn transcript_emission(body: Value) -> Emission {
    Emission {
        trigger: "historico",
        request_id: "r-hist",
        api_path: "/api/aluno/historico",
        body,
    }
}

// ── Transcript ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_transcript_end_to_end() {
    let session = ScriptedSession::new(true, vec![transcript_emission(transcript_body())]);
    let factory = ScriptedFactory::new(vec![Arc::clone(&session)]);
    let portal = factory.portal();

    let outcome = portal.fetch_transcript(&creds()).await.unwrap();
    assert_eq!(outcome.data.len(), 3);

    let calc = &outcome.data[0];
    assert_eq!(calc.code, "60963");
    assert_eq!(calc.name, "Calculus I");
    assert_eq!(calc.final_grade, Some(7.5));
    assert_eq!(calc.status, CourseStatus::Passed);
    assert_eq!(calc.absences, 4);
    assert_eq!(calc.contact_hours, 60);
    assert_eq!(calc.term_taken.as_deref(), Some("2024/1"));

    assert_eq!(outcome.data[1].status, CourseStatus::InProgress);
    assert_eq!(outcome.data[1].final_grade, None);
    assert_eq!(outcome.data[2].status, CourseStatus::Failed);

    // Wire form: camelCase keys, enum status token, absent grades
    // omitted entirely.
    assert_json_include!(
        actual: serde_json::to_value(calc).unwrap(),
        expected: json!({
            "code": "60963",
            "finalGrade": 7.5,
            "status": "PASSED",
            "absences": 4,
            "termTaken": "2024/1"
        })
    );

    assert!(!outcome.raw.is_null());
    assert_eq!(outcome.attempts, 1);
    assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
    assert!(session.closed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_empty_transcript_retries_with_fresh_session() {
    let empty = ScriptedSession::new(
        true,
        vec![transcript_emission(json!({"Apresentacao": []}))],
    );
    let full = ScriptedSession::new(true, vec![transcript_emission(transcript_body())]);
    let factory = ScriptedFactory::new(vec![Arc::clone(&empty), Arc::clone(&full)]);
    let portal = factory.portal();

    let outcome = portal.fetch_transcript(&creds()).await.unwrap();
    assert_eq!(outcome.data.len(), 3);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(factory.calls.load(Ordering::SeqCst), 2);
    assert!(empty.closed.load(Ordering::SeqCst));
    assert!(full.closed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_credentials_fail_without_retry() {
    let session = ScriptedSession::new(false, vec![]);
    let factory = ScriptedFactory::new(vec![Arc::clone(&session)]);
    let portal = factory.portal();

    let err = portal.fetch_transcript(&creds()).await.unwrap_err();
    assert!(matches!(err, PortalError::Authentication));
    // One session only: a rejected password will not pass on attempt two.
    assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
    assert!(session.closed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_lost_browser_retries_then_surfaces_connection_error() {
    let factory = ScriptedFactory::new(vec![]);
    let portal = factory.portal();

    let err = portal.fetch_transcript(&creds()).await.unwrap_err();
    assert!(matches!(err, PortalError::Connection(_)));
    assert_eq!(factory.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unrecognized_payload_surfaces_parse_error() {
    // The portal answered, but with a shape the normalizer has never
    // seen. That is drift, not flakiness, so no retry.
    let weird = json!({"html": "<table><tr><td>60963</td></tr></table>"});
    let session = ScriptedSession::new(true, vec![transcript_emission(weird)]);
    let factory = ScriptedFactory::new(vec![Arc::clone(&session)]);
    let portal = factory.portal();

    let err = portal.fetch_transcript(&creds()).await.unwrap_err();
    assert!(matches!(err, PortalError::Parse { .. }));
    assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
}

// ── Login ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_login_verifies_and_discards_session() {
    let session = ScriptedSession::new(true, vec![]);
    let factory = ScriptedFactory::new(vec![Arc::clone(&session)]);
    let portal = factory.portal();

    let outcome = portal.login(&creds()).await.unwrap();
    assert!(outcome.success);
    assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
    assert!(session.closed.load(Ordering::SeqCst));
}

// ── Current grades ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_current_grades_prefer_dedicated_listing() {
    let grades_body = json!({
        "Apresentacao": [{
            "CodDisciplina": "60990",
            "NomeDisciplina": "Linear Algebra",
            "NotaEtapa1": "8,0",
            "Situacao": "Cursando"
        }]
    });
    let session = ScriptedSession::new(
        true,
        vec![
            Emission {
                trigger: "boletim",
                request_id: "r-bol",
                api_path: "/api/aluno/boletim",
                body: grades_body,
            },
            transcript_emission(transcript_body()),
        ],
    );
    let factory = ScriptedFactory::new(vec![Arc::clone(&session)]);
    let portal = factory.portal();

    let outcome = portal.fetch_current_grades(&creds()).await.unwrap();
    assert_eq!(outcome.data.len(), 1);
    assert_eq!(outcome.data[0].code, "60990");
    assert_eq!(outcome.data[0].grade_a, Some(8.0));
}

#[tokio::test(start_paused = true)]
async fn test_current_grades_fall_back_to_transcript_rows_in_progress() {
    let session = ScriptedSession::new(
        true,
        vec![
            Emission {
                trigger: "boletim",
                request_id: "r-bol",
                api_path: "/api/aluno/boletim",
                body: json!({"Apresentacao": []}),
            },
            transcript_emission(transcript_body()),
        ],
    );
    let factory = ScriptedFactory::new(vec![Arc::clone(&session)]);
    let portal = factory.portal();

    let outcome = portal.fetch_current_grades(&creds()).await.unwrap();
    assert_eq!(outcome.data.len(), 1);
    assert_eq!(outcome.data[0].code, "60990");
    assert_eq!(outcome.data[0].status, CourseStatus::InProgress);
}

// ── Curriculum ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_curriculum_end_to_end() {
    let body = json!({
        "Apresentacao": [
            {
                "CodDisciplina": "60963",
                "NomeDisciplina": "Calculus I",
                "Periodo": "1",
                "QtdCreditos": "4",
                "CargaHoraria": "60",
                "NotaFinal": "7,5"
            },
            {
                "CodDisciplina": "61200",
                "NomeDisciplina": "Topology",
                "Periodo": "5",
                "SubGrupo": "Optativa"
            }
        ]
    });
    let session = ScriptedSession::new(
        true,
        vec![Emission {
            trigger: "matriz",
            request_id: "r-mat",
            api_path: "/api/curso/matriz-curricular",
            body,
        }],
    );
    let factory = ScriptedFactory::new(vec![Arc::clone(&session)]);
    let portal = factory.portal();

    let outcome = portal.fetch_curriculum(&creds()).await.unwrap();
    assert_eq!(outcome.data.len(), 2);

    let calc = &outcome.data[0];
    assert_eq!(calc.term, 1);
    assert_eq!(calc.credits, 4);
    assert_eq!(calc.kind, CourseKind::Required);
    // Curriculum rows carry no grades; the passing grade only feeds the
    // derived status.
    assert_eq!(calc.final_grade, None);
    assert_eq!(calc.status, CourseStatus::Passed);

    let topo = &outcome.data[1];
    assert_eq!(topo.kind, CourseKind::Elective);
    assert_eq!(topo.status, CourseStatus::NotStarted);
    assert_eq!(topo.credits, 0);
}

// ── Capture quality ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_warning_flagged_capture_upgraded_by_clean_duplicate() {
    // The portal answers the transcript endpoint twice: once with a
    // warning envelope and no rows, once clean. Whichever order the
    // bodies land in, the clean capture must win.
    let warned = json!({
        "Messages": [{"Type": "Warning", "Text": "dados desatualizados"}],
        "Apresentacao": []
    });
    let session = ScriptedSession::new(
        true,
        vec![
            Emission {
                trigger: "historico",
                request_id: "r-warn",
                api_path: "/api/aluno/historico",
                body: warned,
            },
            Emission {
                trigger: "historico",
                request_id: "r-clean",
                api_path: "/api/aluno/historico",
                body: transcript_body(),
            },
        ],
    );
    let factory = ScriptedFactory::new(vec![Arc::clone(&session)]);
    let portal = factory.portal();

    let outcome = portal.fetch_transcript(&creds()).await.unwrap();
    assert_eq!(outcome.data.len(), 3);
    assert_eq!(outcome.data[0].code, "60963");
}
