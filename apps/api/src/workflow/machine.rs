//! The workflow engine.
//!
//! Each operation validates its trigger against the current stage *before*
//! touching any service, performs that stage's side effects in their required
//! order, mutates the session only from results of completed side effects, and
//! advances the stage last. A failed generation pipeline follows the declared
//! recovery edge back to `waiting_job_description`; every other failure leaves
//! the stage where it was.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use crate::extract::DocumentExtractor;
use crate::gateway::{GatewayError, PersistenceGateway};
use crate::generation::GenerationService;
use crate::models::job::JobRow;
use crate::models::user::UserSummary;
use crate::render::RenderService;
use crate::workflow::session::{IdentityCheck, SessionState};
use crate::workflow::stage::{Stage, Trigger};
use crate::workflow::WorkflowError;

/// A granted transition: the stage the session moved to plus the user-facing
/// message for it.
#[derive(Debug, Clone, Serialize)]
pub struct Advance {
    pub stage: Stage,
    pub message: String,
}

impl Advance {
    fn for_trigger(trigger: Trigger, stage: Stage) -> Self {
        Self {
            stage,
            message: trigger.message().to_string(),
        }
    }
}

pub struct Workflow {
    pub(crate) gateway: Arc<dyn PersistenceGateway>,
    pub(crate) extractor: Arc<dyn DocumentExtractor>,
    pub(crate) generator: Arc<dyn GenerationService>,
    pub(crate) renderer: Arc<dyn RenderService>,
    pub(crate) template_key: String,
}

impl Workflow {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        extractor: Arc<dyn DocumentExtractor>,
        generator: Arc<dyn GenerationService>,
        renderer: Arc<dyn RenderService>,
        template_key: String,
    ) -> Self {
        Self {
            gateway,
            extractor,
            generator,
            renderer,
            template_key,
        }
    }

    /// Resolves the transition edge for `trigger`, or rejects the action
    /// without any side effect.
    fn edge(
        session: &SessionState,
        trigger: Trigger,
    ) -> Result<Stage, WorkflowError> {
        session
            .stage()
            .next(trigger)
            .ok_or(WorkflowError::InvalidTrigger {
                stage: session.stage(),
                action: trigger.as_str(),
            })
    }

    fn require_stage(
        session: &SessionState,
        stage: Stage,
        action: &'static str,
    ) -> Result<(), WorkflowError> {
        if session.stage() != stage {
            return Err(WorkflowError::InvalidTrigger {
                stage: session.stage(),
                action,
            });
        }
        Ok(())
    }

    // ── start stage ─────────────────────────────────────────────────────────

    /// Read-only listing of stored identities for the start-stage table.
    pub async fn list_users(&self) -> Result<Vec<UserSummary>, WorkflowError> {
        self.gateway.list_users().await.map_err(persistence)
    }

    /// Answers "does this identity exist?", caching the answer per distinct
    /// typed value so repeated checks of the same input cost one lookup.
    pub async fn check_identity(
        &self,
        session: &mut SessionState,
        identity: &str,
    ) -> Result<bool, WorkflowError> {
        Self::require_stage(session, Stage::Start, "check_identity")?;
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(WorkflowError::Validation(
                "Enter an identity to check.".to_string(),
            ));
        }

        if let Some(cached) = &session.identity_check {
            if cached.input == identity {
                return Ok(cached.exists);
            }
        }

        let count = self
            .gateway
            .user_exists(identity)
            .await
            .map_err(persistence)?;
        let exists = count > 0;
        session.identity_check = Some(IdentityCheck {
            input: identity.to_string(),
            exists,
        });
        Ok(exists)
    }

    /// Existing-identity path: load the stored documents and advance.
    pub async fn continue_existing_user(
        &self,
        session: &mut SessionState,
        identity: &str,
    ) -> Result<Advance, WorkflowError> {
        let next = Self::edge(session, Trigger::SelectUser)?;
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(WorkflowError::Validation(
                "Enter an identity to continue with.".to_string(),
            ));
        }

        let (resume_text, profile_text) = match self.gateway.get_user_info(identity).await {
            Ok(texts) => texts,
            Err(GatewayError::NotFound(_)) => {
                return Err(WorkflowError::Validation(format!(
                    "No stored profile for '{identity}'. Upload documents to create one."
                )));
            }
            Err(e) => return Err(persistence(e)),
        };

        session.identity = Some(identity.to_string());
        session.resume_text = resume_text;
        session.profile_text = profile_text;
        session.set_stage(next);
        info!("Session continues with existing user {identity}");
        Ok(Advance::for_trigger(Trigger::SelectUser, next))
    }

    /// New-identity path: extract both uploads, persist the user record
    /// atomically, and only then populate the session and advance. A failure
    /// at any point leaves the session in `start` with nothing merged.
    pub async fn onboard_new_user(
        &self,
        session: &mut SessionState,
        identity: &str,
        resume_document: &[u8],
        profile_document: &[u8],
    ) -> Result<Advance, WorkflowError> {
        let next = Self::edge(session, Trigger::SelectUser)?;
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(WorkflowError::Validation(
                "Enter an identity for this profile.".to_string(),
            ));
        }
        if resume_document.is_empty() || profile_document.is_empty() {
            return Err(WorkflowError::Validation(
                "Both a resume PDF and a profile export PDF are required.".to_string(),
            ));
        }

        let resume_text = self
            .extractor
            .extract_text(resume_document)
            .await
            .map_err(|e| WorkflowError::Validation(format!("Resume upload unreadable: {e}")))?;
        let profile_text = self
            .extractor
            .extract_text(profile_document)
            .await
            .map_err(|e| WorkflowError::Validation(format!("Profile upload unreadable: {e}")))?;

        self.gateway
            .create_user(identity, &resume_text, &profile_text)
            .await
            .map_err(persistence)?;

        session.identity = Some(identity.to_string());
        session.resume_text = resume_text;
        session.profile_text = profile_text;
        session.set_stage(next);
        info!("Created user {identity} from uploaded documents");
        Ok(Advance::for_trigger(Trigger::SelectUser, next))
    }

    // ── waiting_job_description stage ───────────────────────────────────────

    /// Read-only listing of this user's stored jobs.
    pub async fn list_jobs(
        &self,
        session: &SessionState,
    ) -> Result<Vec<JobRow>, WorkflowError> {
        Self::require_stage(session, Stage::WaitingJobDescription, "list_jobs")?;
        let identity = require_identity(session)?;
        self.gateway.list_jobs(identity).await.map_err(persistence)
    }

    /// New-job path: persist the description, take the assigned id, advance.
    pub async fn submit_new_job(
        &self,
        session: &mut SessionState,
        job_text: &str,
    ) -> Result<Advance, WorkflowError> {
        let next = Self::edge(session, Trigger::JobDescriptionUploaded)?;
        let job_text = job_text.trim();
        if job_text.is_empty() {
            return Err(WorkflowError::Validation(
                "Please enter a job description.".to_string(),
            ));
        }
        let identity = require_identity(session)?.to_string();

        let job_id = self
            .gateway
            .create_job(&identity, job_text)
            .await
            .map_err(persistence)?;

        session.job_id = Some(job_id);
        session.job_text = job_text.to_string();
        session.set_stage(next);
        info!("Saved job {job_id} for user {identity}");
        Ok(Advance::for_trigger(Trigger::JobDescriptionUploaded, next))
    }

    /// Existing-job path: copy the selected job's text into the session and
    /// advance. Re-running a job that already has a generated result is
    /// allowed; the next pipeline run overwrites it.
    pub async fn select_existing_job(
        &self,
        session: &mut SessionState,
        job_id: i64,
    ) -> Result<Advance, WorkflowError> {
        let next = Self::edge(session, Trigger::JobDescriptionUploaded)?;
        let identity = require_identity(session)?.to_string();

        let jobs = self
            .gateway
            .list_jobs(&identity)
            .await
            .map_err(persistence)?;
        let job = jobs
            .into_iter()
            .find(|j| j.id == job_id)
            .ok_or_else(|| {
                WorkflowError::Validation(format!("Job {job_id} not found for this user."))
            })?;

        session.job_id = Some(job.id);
        session.job_text = job.job_text;
        session.set_stage(next);
        Ok(Advance::for_trigger(Trigger::JobDescriptionUploaded, next))
    }

    // ── processing_llm stage ────────────────────────────────────────────────

    /// The generation pipeline: generate, persist the result, render the
    /// document. All three must succeed before the session sees the result and
    /// the stage advances; a failure at any step reverts to
    /// `waiting_job_description` so the user retries the whole pipeline.
    pub async fn run_generation(
        &self,
        session: &mut SessionState,
    ) -> Result<Advance, WorkflowError> {
        let next = Self::edge(session, Trigger::Finished)?;
        let identity = require_identity(session)?.to_string();
        let job_id = session.job_id.ok_or_else(|| {
            WorkflowError::Validation("No job selected for this session.".to_string())
        })?;
        if session.resume_text.is_empty()
            || session.profile_text.is_empty()
            || session.job_text.is_empty()
        {
            return Err(WorkflowError::Validation(
                "Session is missing candidate material for generation.".to_string(),
            ));
        }

        // Step 1: generation
        let result = match self
            .generator
            .generate_tailored_result(
                &identity,
                &session.resume_text,
                &session.profile_text,
                &session.job_text,
            )
            .await
        {
            Ok(r) => r,
            Err(e) => return Err(self.revert(session, WorkflowError::Generation(e.to_string()))),
        };
        info!("Step 1/3 complete: tailored result generated for job {job_id}");

        // Step 2: persist the result against the job record
        if let Err(e) = self
            .gateway
            .save_generated_result(&identity, job_id, &result)
            .await
        {
            return Err(self.revert(session, WorkflowError::Persistence(e.to_string())));
        }
        info!("Step 2/3 complete: result persisted for job {job_id}");

        // Step 3: render and store the document
        if let Err(e) = self
            .renderer
            .render_and_store(&self.template_key, &identity, job_id, &result)
            .await
        {
            return Err(self.revert(session, WorkflowError::Rendering(e.to_string())));
        }
        info!("Step 3/3 complete: document rendered for job {job_id}");

        session.generated_result = Some(result);
        session.set_stage(next);
        Ok(Advance::for_trigger(Trigger::Finished, next))
    }

    /// Follows the declared recovery edge and passes the failure through.
    fn revert(&self, session: &mut SessionState, error: WorkflowError) -> WorkflowError {
        if let Some(recovered) = session.stage().on_failure() {
            warn!(
                "Generation pipeline failed ({error}); reverting to {}",
                recovered.as_str()
            );
            session.set_stage(recovered);
        }
        error
    }

    // ── job_exploration stage ───────────────────────────────────────────────

    /// Fetches the rendered document by re-deriving its storage key.
    pub async fn document(&self, session: &SessionState) -> Result<Bytes, WorkflowError> {
        Self::require_stage(session, Stage::JobExploration, "download_document")?;
        let identity = require_identity(session)?;
        let job_id = session.job_id.ok_or_else(|| {
            WorkflowError::Validation("No job selected for this session.".to_string())
        })?;
        self.renderer
            .fetch_document(identity, job_id)
            .await
            .map_err(|e| WorkflowError::Rendering(e.to_string()))
    }

    /// The reset edge: clears all session data unconditionally, including any
    /// unsent chat input, and returns to `start`.
    pub fn return_to_menu(
        &self,
        session: &mut SessionState,
    ) -> Result<Advance, WorkflowError> {
        let next = Self::edge(session, Trigger::Menu)?;
        session.reset();
        debug_assert_eq!(session.stage(), next);
        Ok(Advance::for_trigger(Trigger::Menu, next))
    }
}

fn require_identity(session: &SessionState) -> Result<&str, WorkflowError> {
    session
        .identity
        .as_deref()
        .ok_or_else(|| WorkflowError::Validation("No identity in this session.".to_string()))
}

fn persistence(e: GatewayError) -> WorkflowError {
    WorkflowError::Persistence(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Value};

    use crate::extract::{DocumentExtractor, ExtractError};
    use crate::gateway::GatewayError;
    use crate::generation::{GenerationError, GenerationService};
    use crate::llm_client::LlmError;
    use crate::models::chat::ChatTranscript;
    use crate::render::{RenderError, RenderService};

    // ── mock leaf services ──────────────────────────────────────────────────

    #[derive(Default)]
    struct MockGateway {
        users: Mutex<HashMap<String, (String, String)>>,
        jobs: Mutex<Vec<JobRow>>,
        results: Mutex<HashMap<(String, i64), Value>>,
        chats: Mutex<HashMap<(String, i64), ChatTranscript>>,
        next_job_id: AtomicI64,
        fail_create_user: AtomicBool,
        fail_save_result: AtomicBool,
        fail_save_chat: AtomicBool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl MockGateway {
        fn with_first_job_id(id: i64) -> Self {
            let gw = Self::default();
            gw.next_job_id.store(id, Ordering::SeqCst);
            gw
        }

        fn log(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn call_count(&self, call: &'static str) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
        }
    }

    #[async_trait]
    impl PersistenceGateway for MockGateway {
        async fn user_exists(&self, identity: &str) -> Result<i64, GatewayError> {
            self.log("user_exists");
            Ok(self.users.lock().unwrap().contains_key(identity) as i64)
        }

        async fn create_user(
            &self,
            identity: &str,
            resume_text: &str,
            profile_text: &str,
        ) -> Result<(), GatewayError> {
            self.log("create_user");
            if self.fail_create_user.load(Ordering::SeqCst) {
                return Err(GatewayError::NotFound("injected failure".to_string()));
            }
            self.users.lock().unwrap().insert(
                identity.to_string(),
                (resume_text.to_string(), profile_text.to_string()),
            );
            Ok(())
        }

        async fn get_user_info(&self, identity: &str) -> Result<(String, String), GatewayError> {
            self.log("get_user_info");
            self.users
                .lock()
                .unwrap()
                .get(identity)
                .cloned()
                .ok_or_else(|| GatewayError::NotFound(format!("user '{identity}'")))
        }

        async fn list_users(&self) -> Result<Vec<UserSummary>, GatewayError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .keys()
                .map(|identity| UserSummary {
                    identity: identity.clone(),
                    last_modified: Utc::now(),
                })
                .collect())
        }

        async fn create_job(&self, identity: &str, job_text: &str) -> Result<i64, GatewayError> {
            self.log("create_job");
            let id = self.next_job_id.fetch_add(1, Ordering::SeqCst);
            self.jobs.lock().unwrap().push(JobRow {
                id,
                identity: identity.to_string(),
                job_text: job_text.to_string(),
                generated_result: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            });
            Ok(id)
        }

        async fn list_jobs(&self, identity: &str) -> Result<Vec<JobRow>, GatewayError> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.identity == identity)
                .cloned()
                .collect())
        }

        async fn save_generated_result(
            &self,
            identity: &str,
            job_id: i64,
            result: &Value,
        ) -> Result<(), GatewayError> {
            self.log("save_generated_result");
            if self.fail_save_result.load(Ordering::SeqCst) {
                return Err(GatewayError::NotFound("injected failure".to_string()));
            }
            self.results
                .lock()
                .unwrap()
                .insert((identity.to_string(), job_id), result.clone());
            Ok(())
        }

        async fn get_chat_history(
            &self,
            identity: &str,
            job_id: i64,
        ) -> Result<Option<ChatTranscript>, GatewayError> {
            self.log("get_chat_history");
            Ok(self
                .chats
                .lock()
                .unwrap()
                .get(&(identity.to_string(), job_id))
                .cloned())
        }

        async fn save_chat_history(
            &self,
            identity: &str,
            job_id: i64,
            transcript: &ChatTranscript,
        ) -> Result<(), GatewayError> {
            self.log("save_chat_history");
            if self.fail_save_chat.load(Ordering::SeqCst) {
                return Err(GatewayError::NotFound("injected failure".to_string()));
            }
            self.chats
                .lock()
                .unwrap()
                .insert((identity.to_string(), job_id), transcript.clone());
            Ok(())
        }
    }

    /// Extracts `"<bytes>-text"`, e.g. `b"R"` becomes `"R-text"`.
    #[derive(Default)]
    struct MockExtractor {
        fail: AtomicBool,
    }

    #[async_trait]
    impl DocumentExtractor for MockExtractor {
        async fn extract_text(&self, document: &[u8]) -> Result<String, ExtractError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ExtractError::Empty);
            }
            Ok(format!("{}-text", String::from_utf8_lossy(document)))
        }
    }

    #[derive(Default)]
    struct MockGenerator {
        fail_generate: AtomicBool,
        fail_chat: AtomicBool,
    }

    #[async_trait]
    impl GenerationService for MockGenerator {
        async fn generate_tailored_result(
            &self,
            _identity: &str,
            _resume_text: &str,
            _profile_text: &str,
            _job_text: &str,
        ) -> Result<Value, GenerationError> {
            if self.fail_generate.load(Ordering::SeqCst) {
                return Err(GenerationError::Llm(LlmError::EmptyContent));
            }
            Ok(json!({"name": "Alice Example", "skills": ["Rust"]}))
        }

        async fn answer_chat_turn(
            &self,
            _transcript: &ChatTranscript,
        ) -> Result<String, GenerationError> {
            if self.fail_chat.load(Ordering::SeqCst) {
                return Err(GenerationError::Llm(LlmError::EmptyContent));
            }
            Ok("You ship reliable systems.".to_string())
        }
    }

    #[derive(Default)]
    struct MockRenderer {
        documents: Mutex<HashMap<(String, i64), Bytes>>,
        fail_render: AtomicBool,
        render_calls: AtomicI64,
    }

    #[async_trait]
    impl RenderService for MockRenderer {
        async fn render_and_store(
            &self,
            _template_key: &str,
            identity: &str,
            job_id: i64,
            _result: &Value,
        ) -> Result<(), RenderError> {
            self.render_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_render.load(Ordering::SeqCst) {
                return Err(RenderError::Storage("injected failure".to_string()));
            }
            self.documents
                .lock()
                .unwrap()
                .insert((identity.to_string(), job_id), Bytes::from_static(b"<html>"));
            Ok(())
        }

        async fn fetch_document(
            &self,
            identity: &str,
            job_id: i64,
        ) -> Result<Bytes, RenderError> {
            self.documents
                .lock()
                .unwrap()
                .get(&(identity.to_string(), job_id))
                .cloned()
                .ok_or(RenderError::NotRendered)
        }
    }

    struct Harness {
        workflow: Workflow,
        gateway: Arc<MockGateway>,
        extractor: Arc<MockExtractor>,
        generator: Arc<MockGenerator>,
        renderer: Arc<MockRenderer>,
    }

    fn harness() -> Harness {
        harness_with_gateway(MockGateway::with_first_job_id(7))
    }

    fn harness_with_gateway(gateway: MockGateway) -> Harness {
        let gateway = Arc::new(gateway);
        let extractor = Arc::new(MockExtractor::default());
        let generator = Arc::new(MockGenerator::default());
        let renderer = Arc::new(MockRenderer::default());
        let workflow = Workflow::new(
            gateway.clone(),
            extractor.clone(),
            generator.clone(),
            renderer.clone(),
            "classic".to_string(),
        );
        Harness {
            workflow,
            gateway,
            extractor,
            generator,
            renderer,
        }
    }

    async fn drive_to_waiting(h: &Harness, session: &mut SessionState) {
        h.workflow
            .onboard_new_user(session, "alice", b"R", b"L")
            .await
            .expect("onboarding must succeed");
    }

    async fn drive_to_processing(h: &Harness, session: &mut SessionState) {
        drive_to_waiting(h, session).await;
        h.workflow
            .submit_new_job(session, "Senior Engineer role...")
            .await
            .expect("job submission must succeed");
    }

    async fn drive_to_exploration(h: &Harness, session: &mut SessionState) {
        drive_to_processing(h, session).await;
        h.workflow
            .run_generation(session)
            .await
            .expect("pipeline must succeed");
    }

    // ── start stage ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_new_user_onboarding_populates_session_and_advances() {
        let h = harness();
        let mut session = SessionState::new();

        let advance = h
            .workflow
            .onboard_new_user(&mut session, "alice", b"R", b"L")
            .await
            .unwrap();

        assert_eq!(advance.stage, Stage::WaitingJobDescription);
        assert_eq!(session.stage(), Stage::WaitingJobDescription);
        assert_eq!(session.identity.as_deref(), Some("alice"));
        assert_eq!(session.resume_text, "R-text");
        assert_eq!(session.profile_text, "L-text");
        assert!(h.gateway.users.lock().unwrap().contains_key("alice"));
    }

    #[tokio::test]
    async fn test_existing_user_continue_loads_stored_documents() {
        let h = harness();
        h.gateway.users.lock().unwrap().insert(
            "alice".to_string(),
            ("R-text".to_string(), "L-text".to_string()),
        );
        let mut session = SessionState::new();

        let advance = h
            .workflow
            .continue_existing_user(&mut session, "alice")
            .await
            .unwrap();

        assert_eq!(advance.stage, Stage::WaitingJobDescription);
        assert_eq!(session.resume_text, "R-text");
        assert_eq!(session.profile_text, "L-text");
        // No document upload involved on this path.
        assert_eq!(h.gateway.call_count("create_user"), 0);
    }

    #[tokio::test]
    async fn test_continue_with_unknown_identity_is_validation_error() {
        let h = harness();
        let mut session = SessionState::new();

        let err = h
            .workflow
            .continue_existing_user(&mut session, "nobody")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(session.stage(), Stage::Start);
        assert!(session.identity.is_none());
    }

    #[tokio::test]
    async fn test_onboarding_persistence_failure_keeps_start_with_nothing_merged() {
        let h = harness();
        h.gateway.fail_create_user.store(true, Ordering::SeqCst);
        let mut session = SessionState::new();
        let before = session.clone();

        let err = h
            .workflow
            .onboard_new_user(&mut session, "alice", b"R", b"L")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Persistence(_)));
        assert_eq!(session, before, "nothing may merge into the session");
        assert!(h.gateway.users.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_onboarding_extraction_failure_attempts_no_persistence() {
        let h = harness();
        h.extractor.fail.store(true, Ordering::SeqCst);
        let mut session = SessionState::new();

        let err = h
            .workflow
            .onboard_new_user(&mut session, "alice", b"R", b"L")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(session.stage(), Stage::Start);
        assert_eq!(h.gateway.call_count("create_user"), 0);
    }

    #[tokio::test]
    async fn test_identity_check_caches_per_typed_value() {
        let h = harness();
        let mut session = SessionState::new();

        assert!(!h.workflow.check_identity(&mut session, "alice").await.unwrap());
        assert!(!h.workflow.check_identity(&mut session, "alice").await.unwrap());
        assert_eq!(h.gateway.call_count("user_exists"), 1, "second check is cached");

        // A changed input invalidates the cache.
        assert!(!h.workflow.check_identity(&mut session, "bob").await.unwrap());
        assert_eq!(h.gateway.call_count("user_exists"), 2);
    }

    // ── waiting_job_description stage ───────────────────────────────────────

    #[tokio::test]
    async fn test_new_job_takes_assigned_id_and_advances() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_waiting(&h, &mut session).await;

        let advance = h
            .workflow
            .submit_new_job(&mut session, "Senior Engineer role...")
            .await
            .unwrap();

        assert_eq!(advance.stage, Stage::ProcessingLlm);
        assert_eq!(session.job_id, Some(7));
        assert_eq!(session.job_text, "Senior Engineer role...");
    }

    #[tokio::test]
    async fn test_blank_job_text_is_rejected_without_transition() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_waiting(&h, &mut session).await;

        let err = h
            .workflow
            .submit_new_job(&mut session, "   ")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(session.stage(), Stage::WaitingJobDescription);
        assert!(session.job_id.is_none());
        assert_eq!(h.gateway.call_count("create_job"), 0);
    }

    #[tokio::test]
    async fn test_select_existing_job_copies_its_text() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_waiting(&h, &mut session).await;
        let job_id = h
            .gateway
            .create_job("alice", "Platform role")
            .await
            .unwrap();

        let advance = h
            .workflow
            .select_existing_job(&mut session, job_id)
            .await
            .unwrap();

        assert_eq!(advance.stage, Stage::ProcessingLlm);
        assert_eq!(session.job_id, Some(job_id));
        assert_eq!(session.job_text, "Platform role");
    }

    #[tokio::test]
    async fn test_select_missing_job_is_validation_error_without_transition() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_waiting(&h, &mut session).await;

        let err = h
            .workflow
            .select_existing_job(&mut session, 999)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(session.stage(), Stage::WaitingJobDescription);
        assert!(session.job_id.is_none());
    }

    // ── processing_llm pipeline ─────────────────────────────────────────────

    #[tokio::test]
    async fn test_successful_pipeline_reaches_exploration_with_result() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_processing(&h, &mut session).await;

        let advance = h.workflow.run_generation(&mut session).await.unwrap();

        assert_eq!(advance.stage, Stage::JobExploration);
        assert!(session.generated_result.is_some());
        assert!(h
            .gateway
            .results
            .lock()
            .unwrap()
            .contains_key(&("alice".to_string(), 7)));
        assert!(h
            .renderer
            .documents
            .lock()
            .unwrap()
            .contains_key(&("alice".to_string(), 7)));
    }

    #[tokio::test]
    async fn test_generation_error_reverts_and_short_circuits_save_and_render() {
        let h = harness();
        h.generator.fail_generate.store(true, Ordering::SeqCst);
        let mut session = SessionState::new();
        drive_to_processing(&h, &mut session).await;

        let err = h.workflow.run_generation(&mut session).await.unwrap_err();

        assert!(matches!(err, WorkflowError::Generation(_)));
        assert_eq!(session.stage(), Stage::WaitingJobDescription);
        assert!(session.generated_result.is_none());
        assert_eq!(h.gateway.call_count("save_generated_result"), 0);
        assert_eq!(h.renderer.render_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_result_persistence_failure_reverts_with_no_result_visible() {
        let h = harness();
        h.gateway.fail_save_result.store(true, Ordering::SeqCst);
        let mut session = SessionState::new();
        drive_to_processing(&h, &mut session).await;

        let err = h.workflow.run_generation(&mut session).await.unwrap_err();

        assert!(matches!(err, WorkflowError::Persistence(_)));
        assert_eq!(session.stage(), Stage::WaitingJobDescription);
        assert!(session.generated_result.is_none());
        assert!(h.gateway.results.lock().unwrap().is_empty());
        assert_eq!(h.renderer.render_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_render_failure_reverts_but_persisted_result_remains() {
        let h = harness();
        h.renderer.fail_render.store(true, Ordering::SeqCst);
        let mut session = SessionState::new();
        drive_to_processing(&h, &mut session).await;

        let err = h.workflow.run_generation(&mut session).await.unwrap_err();

        assert!(matches!(err, WorkflowError::Rendering(_)));
        assert_eq!(session.stage(), Stage::WaitingJobDescription);
        assert!(session.generated_result.is_none());
        // Known inconsistency window: step 2 already persisted the result.
        assert!(!h.gateway.results.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_after_render_failure_overwrites_cleanly() {
        let h = harness();
        h.renderer.fail_render.store(true, Ordering::SeqCst);
        let mut session = SessionState::new();
        drive_to_processing(&h, &mut session).await;
        h.workflow.run_generation(&mut session).await.unwrap_err();

        // User retries the whole pipeline from waiting_job_description.
        h.renderer.fail_render.store(false, Ordering::SeqCst);
        h.workflow
            .select_existing_job(&mut session, 7)
            .await
            .unwrap();
        let advance = h.workflow.run_generation(&mut session).await.unwrap();

        assert_eq!(advance.stage, Stage::JobExploration);
        assert_eq!(h.gateway.results.lock().unwrap().len(), 1);
        assert_eq!(h.renderer.documents.lock().unwrap().len(), 1);
    }

    // ── stage/data invariants ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_processing_stage_implies_candidate_material_present() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_processing(&h, &mut session).await;

        assert_eq!(session.stage(), Stage::ProcessingLlm);
        assert!(!session.resume_text.is_empty());
        assert!(!session.profile_text.is_empty());
        assert!(!session.job_text.is_empty());
    }

    #[tokio::test]
    async fn test_exploration_stage_implies_generated_result_present() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_exploration(&h, &mut session).await;

        assert_eq!(session.stage(), Stage::JobExploration);
        assert!(session.generated_result.is_some());
    }

    #[tokio::test]
    async fn test_invalid_triggers_leave_session_unchanged() {
        let h = harness();
        let mut session = SessionState::new();
        let before = session.clone();

        // None of these actions are valid in `start`.
        assert!(matches!(
            h.workflow.run_generation(&mut session).await,
            Err(WorkflowError::InvalidTrigger { .. })
        ));
        assert!(matches!(
            h.workflow.submit_new_job(&mut session, "role").await,
            Err(WorkflowError::InvalidTrigger { .. })
        ));
        assert!(matches!(
            h.workflow.return_to_menu(&mut session),
            Err(WorkflowError::InvalidTrigger { .. })
        ));
        assert!(matches!(
            h.workflow.document(&session).await,
            Err(WorkflowError::InvalidTrigger { .. })
        ));

        assert_eq!(session, before);
        assert_eq!(h.gateway.call_count("create_job"), 0);
        assert_eq!(h.gateway.call_count("save_generated_result"), 0);
    }

    #[tokio::test]
    async fn test_select_user_invalid_once_past_start() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_waiting(&h, &mut session).await;
        let before = session.clone();

        let err = h
            .workflow
            .onboard_new_user(&mut session, "bob", b"R", b"L")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::InvalidTrigger { .. }));
        assert_eq!(session, before);
    }

    // ── reset edge ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_menu_clears_session_back_to_initial() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_exploration(&h, &mut session).await;

        let advance = h.workflow.return_to_menu(&mut session).unwrap();

        assert_eq!(advance.stage, Stage::Start);
        assert_eq!(session, SessionState::new());
    }

    #[tokio::test]
    async fn test_result_survives_menu_reset_in_persistence() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_exploration(&h, &mut session).await;
        h.workflow.return_to_menu(&mut session).unwrap();

        // The session is gone but the job's result is still retrievable.
        let jobs = h.gateway.list_jobs("alice").await.unwrap();
        assert!(h
            .gateway
            .results
            .lock()
            .unwrap()
            .contains_key(&("alice".to_string(), jobs[0].id)));
    }

    // ── document download ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_document_download_in_exploration() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_exploration(&h, &mut session).await;

        let bytes = h.workflow.document(&session).await.unwrap();
        assert_eq!(&bytes[..], b"<html>");
    }

    // ── chat sub-workflow ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_chat_bootstraps_system_turn_from_session_material() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_exploration(&h, &mut session).await;

        let transcript = h.workflow.transcript(&mut session).await.unwrap();

        assert_eq!(transcript.len(), 1);
        let system = transcript.system_turn().expect("system turn must exist");
        assert!(system.content.contains("R-text"));
        assert!(system.content.contains("L-text"));
        assert!(system.content.contains("Senior Engineer role..."));
    }

    #[tokio::test]
    async fn test_chat_round_trip_adds_exactly_two_turns_and_persists() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_exploration(&h, &mut session).await;
        let before_len = h.workflow.transcript(&mut session).await.unwrap().len();

        let reply = h
            .workflow
            .send_chat_turn(&mut session, "Summarize my strengths")
            .await
            .unwrap();

        let in_memory = session.transcript.as_ref().unwrap();
        assert_eq!(in_memory.len(), before_len + 2);
        assert_eq!(reply.transcript_len, in_memory.len());
        assert_eq!(reply.assistant, "You ship reliable systems.");

        let persisted = h
            .gateway
            .chats
            .lock()
            .unwrap()
            .get(&("alice".to_string(), 7))
            .cloned()
            .expect("round-trip must be persisted");
        assert_eq!(&persisted, in_memory);
    }

    #[tokio::test]
    async fn test_chat_reloads_persisted_history_instead_of_bootstrapping() {
        let h = harness();
        let mut seeded = ChatTranscript::with_system("earlier grounding".to_string());
        seeded.push_user("old question".to_string());
        seeded.push_assistant("old answer".to_string());
        h.gateway
            .chats
            .lock()
            .unwrap()
            .insert(("alice".to_string(), 7), seeded.clone());

        let mut session = SessionState::new();
        drive_to_exploration(&h, &mut session).await;
        let transcript = h.workflow.transcript(&mut session).await.unwrap();

        assert_eq!(transcript, seeded);
        assert_eq!(
            transcript.system_turn().unwrap().content,
            "earlier grounding",
            "system turn is never rebuilt once created"
        );
    }

    #[tokio::test]
    async fn test_chat_generation_failure_leaves_transcript_untouched() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_exploration(&h, &mut session).await;
        let before = h.workflow.transcript(&mut session).await.unwrap();

        h.generator.fail_chat.store(true, Ordering::SeqCst);
        let err = h
            .workflow
            .send_chat_turn(&mut session, "Summarize my strengths")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Generation(_)));
        assert_eq!(session.transcript.as_ref().unwrap(), &before);
        assert_eq!(h.gateway.call_count("save_chat_history"), 0);
    }

    #[tokio::test]
    async fn test_chat_persistence_failure_discards_the_round_trip() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_exploration(&h, &mut session).await;
        let before = h.workflow.transcript(&mut session).await.unwrap();

        h.gateway.fail_save_chat.store(true, Ordering::SeqCst);
        let err = h
            .workflow
            .send_chat_turn(&mut session, "Summarize my strengths")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Persistence(_)));
        assert_eq!(
            session.transcript.as_ref().unwrap(),
            &before,
            "neither turn of the failed round-trip may be kept"
        );
        assert!(h.gateway.chats.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_chat_message_is_rejected() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_exploration(&h, &mut session).await;

        let err = h
            .workflow
            .send_chat_turn(&mut session, "  ")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(session.transcript.as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_chat_outside_exploration_is_rejected() {
        let h = harness();
        let mut session = SessionState::new();
        drive_to_waiting(&h, &mut session).await;
        let before = session.clone();

        let err = h
            .workflow
            .send_chat_turn(&mut session, "hello")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::InvalidTrigger { .. }));
        assert_eq!(session, before);
    }
}
