use daxi_core::{
    AssistantError, Attachment, DdlDialect, FileMirror, FsProjectRepository, GenerationRequest,
    Operation, ProjectRepository, SchemaAssistant, SchemaDocument, SessionController,
    SessionError, Severity,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Assistant that replays canned replies and remembers what it was asked.
#[derive(Default)]
struct ScriptedAssistant {
    schema_reply: Option<Result<String, String>>,
    ddl_reply: String,
    documentation_reply: String,
    delay: Option<Duration>,
    seen_prompts: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak_running: AtomicUsize,
}

impl ScriptedAssistant {
    fn replying(reply: &str) -> Self {
        Self {
            schema_reply: Some(Ok(reply.to_string())),
            ..Self::default()
        }
    }
}

impl SchemaAssistant for ScriptedAssistant {
    fn generate_schema(&self, request: &GenerationRequest) -> Result<String, AssistantError> {
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.seen_prompts.lock().unwrap().push(request.prompt.clone());
        match &self.schema_reply {
            Some(Ok(reply)) => Ok(reply.clone()),
            Some(Err(message)) => Err(AssistantError::Service(message.clone())),
            None => Err(AssistantError::Service("no scripted reply".to_string())),
        }
    }

    fn export_ddl(
        &self,
        _dialect: DdlDialect,
        _document: &SchemaDocument,
    ) -> Result<String, AssistantError> {
        Ok(self.ddl_reply.clone())
    }

    fn write_documentation(&self, _document: &SchemaDocument) -> Result<String, AssistantError> {
        Ok(self.documentation_reply.clone())
    }
}

type Session = SessionController<FsProjectRepository, FileMirror>;

fn session_with(dir: &tempfile::TempDir, assistant: Arc<ScriptedAssistant>) -> Session {
    SessionController::new(
        FsProjectRepository::new(dir.path().join("projects")),
        FileMirror::new(dir.path().join("curr_model.json")),
    )
    .with_assistant(assistant)
}

fn orders_document() -> SchemaDocument {
    SchemaDocument::from_value(json!({
        "entities": [{ "name": "orders", "attributes": [{ "name": "id", "type": "int" }] }],
        "relationships": []
    }))
}

#[test]
fn generate_applies_saves_and_records_reply() {
    let dir = tempfile::tempdir().unwrap();
    let reply = format!("Here is the model:\n```json\n{}\n```", orders_document().serialize());
    let assistant = Arc::new(ScriptedAssistant::replying(&reply));
    let mut session = session_with(&dir, assistant.clone());
    session.create_project(Some("Shop")).unwrap();

    let reference = Attachment::new("notes.txt", b"orders have ids".to_vec(), "text/plain");
    let project = session
        .generate("add an orders table", vec![reference], Vec::new())
        .unwrap();

    assert_eq!(project.document, orders_document());
    assert_eq!(session.history().len(), 2);
    assert_eq!(session.history().current_index(), Some(1));
    assert_eq!(
        session.store().load("Shop").unwrap().document,
        orders_document()
    );
    assert_eq!(
        assistant.seen_prompts.lock().unwrap().as_slice(),
        ["add an orders table".to_string()]
    );
    assert!(session.in_flight().active().is_none());
}

#[test]
fn generate_failure_leaves_session_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = Arc::new(ScriptedAssistant {
        schema_reply: Some(Err("quota exceeded".to_string())),
        ..ScriptedAssistant::default()
    });
    let mut session = session_with(&dir, assistant);
    session.create_project(Some("Shop")).unwrap();

    let err = session.generate("anything", Vec::new(), Vec::new()).unwrap_err();

    assert!(matches!(err, SessionError::Assistant(AssistantError::Service(_))));
    assert_eq!(err.severity(), Severity::Error);
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.active().unwrap().document, SchemaDocument::empty());
    assert!(!session.store().exists("Shop").unwrap());
}

#[test]
fn unparseable_reply_is_a_format_failure() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = Arc::new(ScriptedAssistant::replying("I cannot help with that."));
    let mut session = session_with(&dir, assistant);
    session.create_project(Some("Shop")).unwrap();

    let err = session.generate("add orders", Vec::new(), Vec::new()).unwrap_err();

    assert!(matches!(err, SessionError::Assistant(AssistantError::Format(_))));
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.active().unwrap().document, SchemaDocument::empty());
}

#[test]
fn second_assistant_call_is_rejected_while_one_is_in_flight() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = Arc::new(ScriptedAssistant::replying("{}"));
    let mut session = session_with(&dir, assistant.clone());
    session.create_project(Some("Shop")).unwrap();

    let guard = session.in_flight();
    let ticket = guard.try_acquire(Operation::ExportDdl).unwrap();

    let err = session.generate("add orders", Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Assistant(AssistantError::Busy(Operation::ExportDdl))
    ));
    assert_eq!(err.severity(), Severity::Warning);
    assert!(assistant.seen_prompts.lock().unwrap().is_empty());

    drop(ticket);
    session.generate("add orders", Vec::new(), Vec::new()).unwrap();
    assert_eq!(session.history().len(), 2);
}

#[test]
fn slow_assistant_times_out_without_applying_reply() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = Arc::new(ScriptedAssistant {
        schema_reply: Some(Ok(orders_document().serialize())),
        delay: Some(Duration::from_millis(500)),
        ..ScriptedAssistant::default()
    });
    let mut session =
        session_with(&dir, assistant).with_assistant_timeout(Duration::from_millis(20));
    session.create_project(Some("Shop")).unwrap();

    let err = session.generate("add orders", Vec::new(), Vec::new()).unwrap_err();

    assert!(matches!(err, SessionError::Assistant(AssistantError::TimedOut(_))));
    assert_eq!(session.in_flight().active(), Some(Operation::Generate));

    std::thread::sleep(Duration::from_millis(900));
    assert!(session.in_flight().active().is_none());
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.active().unwrap().document, SchemaDocument::empty());
}

#[test]
fn calls_after_a_timeout_wait_for_the_running_call() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = Arc::new(ScriptedAssistant {
        schema_reply: Some(Ok(orders_document().serialize())),
        ddl_reply: "CREATE TABLE orders (id INT);".to_string(),
        delay: Some(Duration::from_millis(300)),
        ..ScriptedAssistant::default()
    });
    let mut session =
        session_with(&dir, assistant.clone()).with_assistant_timeout(Duration::from_millis(20));
    session.create_project(Some("Shop")).unwrap();

    let first = session.generate("add orders", Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(first, SessionError::Assistant(AssistantError::TimedOut(_))));

    let second = session.generate("add orders again", Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(
        second,
        SessionError::Assistant(AssistantError::Busy(Operation::Generate))
    ));
    assert_eq!(second.severity(), Severity::Warning);
    let export = session.export_ddl(DdlDialect::Postgre).unwrap_err();
    assert!(matches!(
        export,
        SessionError::Assistant(AssistantError::Busy(Operation::Generate))
    ));

    std::thread::sleep(Duration::from_millis(700));
    assert!(session.in_flight().active().is_none());
    assert_eq!(assistant.peak_running.load(Ordering::SeqCst), 1);
    assert_eq!(assistant.seen_prompts.lock().unwrap().len(), 1);

    session.export_ddl(DdlDialect::Postgre).unwrap();
}

#[test]
fn export_ddl_names_file_by_dialect_and_strips_fence() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = Arc::new(ScriptedAssistant {
        ddl_reply: "Sure:\n```sql\nCREATE TABLE orders (id INT);\n```\nDone.".to_string(),
        ..ScriptedAssistant::default()
    });
    let mut session = session_with(&dir, assistant);
    session.create_project(Some("Shop")).unwrap();

    let artifact = session.export_ddl(DdlDialect::SqlServer).unwrap();

    assert!(artifact.file_name.starts_with("sqlserver_ddl_"));
    assert!(artifact.file_name.ends_with(".sql"));
    // sqlserver_ddl_YYYYmmdd_HHMMSS.sql
    assert_eq!(artifact.file_name.len(), "sqlserver_ddl_".len() + 15 + ".sql".len());
    assert_eq!(
        String::from_utf8(artifact.bytes.clone()).unwrap(),
        "CREATE TABLE orders (id INT);\n"
    );

    let written = artifact.write_to(&dir.path().join("exports")).unwrap();
    assert!(written.is_file());
    assert_eq!(session.history().len(), 1);
}

#[test]
fn export_ddl_rejects_empty_reply() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = Arc::new(ScriptedAssistant {
        ddl_reply: "   ".to_string(),
        ..ScriptedAssistant::default()
    });
    let mut session = session_with(&dir, assistant);
    session.create_project(Some("Shop")).unwrap();

    let err = session.export_ddl(DdlDialect::Oracle).unwrap_err();
    assert!(matches!(err, SessionError::Assistant(AssistantError::Service(_))));
}

#[test]
fn export_documentation_produces_docx_archive() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = Arc::new(ScriptedAssistant {
        documentation_reply: "# Overview\nShop schema.\n\n# Entities\n## orders\nOne row per order."
            .to_string(),
        ..ScriptedAssistant::default()
    });
    let mut session = session_with(&dir, assistant);
    session.create_project(Some("Shop")).unwrap();

    let artifact = session.export_documentation().unwrap();

    assert!(artifact.file_name.starts_with("documentation_"));
    assert!(artifact.file_name.ends_with(".docx"));
    assert!(artifact.bytes.starts_with(b"PK"));
}

#[test]
fn assistant_operations_need_configuration_and_an_open_project() {
    let dir = tempfile::tempdir().unwrap();
    let mut bare: Session = SessionController::new(
        FsProjectRepository::new(dir.path().join("projects")),
        FileMirror::new(dir.path().join("curr_model.json")),
    );
    bare.create_project(Some("Shop")).unwrap();
    let err = bare.export_documentation().unwrap_err();
    assert!(matches!(err, SessionError::Assistant(AssistantError::NotConfigured)));

    let mut unopened = session_with(&dir, Arc::new(ScriptedAssistant::replying("{}")));
    let err = unopened.generate("x", Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, SessionError::NoActiveProject));
}
