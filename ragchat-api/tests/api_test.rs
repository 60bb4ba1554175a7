//! Router tests over in-memory collaborators.

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};
use ragchat_api::core::auth::hash_password;
use ragchat_api::models::api::{LoginResponse, SessionView, UploadResponse};
use ragchat_api::{AppState, Settings, create_app};
use lopdf::content::{Content, Operation};
use lopdf::{Object, Stream, dictionary};
use ragchat_core::{Catalog, InMemoryResourceFactory, ResourceKey, ScriptedChatModel};
use serde_json::json;
use std::sync::Arc;

const LOCALIZATION: &str = "locale,key,value
en_US,assistant_welcome,Hi! How can I help?
en_US,sources_used,Sources used
en_US,load_text,chunks loaded from text
en_US,load_pdf,chunks loaded from PDF
en_US,deleting_memory,Deleting memory...
en_US,deleting_context,Deleting context...
";

const RAILS: &str = "username,key,value
datastax,1,What is Astra DB?
";

fn server(model: ScriptedChatModel) -> TestServer {
    let catalog = Catalog::from_csv(LOCALIZATION, RAILS, "content").unwrap();
    server_with_catalog(model, catalog)
}

fn server_with_catalog(model: ScriptedChatModel, catalog: Catalog) -> TestServer {
    TestServer::new(create_app(app_state(model, catalog, ""))).unwrap()
}

fn app_state(model: ScriptedChatModel, catalog: Catalog, extra_config: &str) -> AppState {
    let config = format!(
        r#"
        [storage]
        backend = "memory"

        [users.alice]
        password_hash = "{alice}"
        delete_option = true

        [users.bob]
        password_hash = "{bob}"

        {extra_config}
        "#,
        alice = hash_password("alice-pw").unwrap(),
        bob = hash_password("bob-pw").unwrap(),
    );
    let settings = Settings::from_toml(&config).unwrap();
    let factory = Arc::new(InMemoryResourceFactory::new(Arc::new(model)));

    AppState::new(settings, factory, catalog).unwrap()
}

fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

async fn login(server: &TestServer, user: &str, password: &str) -> String {
    let response = server
        .post("/v1/login")
        .json(&json!({"username": user, "password": password}))
        .await;
    response.assert_status_ok();
    response.json::<LoginResponse>().token
}

fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

#[tokio::test]
async fn test_health() {
    let server = server(ScriptedChatModel::new(["ok"]));
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let server = server(ScriptedChatModel::new(["ok"]));
    let response = server
        .post("/v1/login")
        .json(&json!({"username": "alice", "password": "nope"}))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert!(response.text().contains("User not known or password incorrect"));

    let response = server
        .post("/v1/login")
        .json(&json!({"username": "mallory", "password": "alice-pw"}))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_requires_token() {
    let server = server(ScriptedChatModel::new(["ok"]));
    server
        .get("/v1/session")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_view_starts_with_welcome() {
    let server = server(ScriptedChatModel::new(["ok"]));
    let token = login(&server, "alice", "alice-pw").await;
    let (name, value) = bearer(&token);

    let view = server
        .get("/v1/session")
        .add_header(name, value)
        .await
        .json::<SessionView>();

    assert_eq!(view.user, "alice");
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].content, "Hi! How can I help?");
    assert_eq!(view.rails.len(), 1);
    assert!(view.delete_context_allowed);
    assert_eq!(view.strings["sources_used"], "Sources used");
}

#[tokio::test]
async fn test_session_view_serves_personal_welcome_page() {
    let dir = tempfile::tempdir().unwrap();
    let localization = dir.path().join("localization.csv");
    let rails = dir.path().join("rails.csv");
    std::fs::write(&localization, LOCALIZATION).unwrap();
    std::fs::write(&rails, RAILS).unwrap();
    std::fs::write(dir.path().join("welcome.md"), "# Welcome").unwrap();
    std::fs::write(dir.path().join("alice.md"), "# Hello Alice").unwrap();

    let catalog = Catalog::load(&localization, &rails, dir.path()).unwrap();
    let server = server_with_catalog(ScriptedChatModel::new(["ok"]), catalog);

    let token = login(&server, "alice", "alice-pw").await;
    let (name, value) = bearer(&token);
    let view = server
        .get("/v1/session")
        .add_header(name, value)
        .await
        .json::<SessionView>();
    assert_eq!(view.welcome.as_deref(), Some("# Hello Alice"));

    let token = login(&server, "bob", "bob-pw").await;
    let (name, value) = bearer(&token);
    let view = server
        .get("/v1/session")
        .add_header(name, value)
        .await
        .json::<SessionView>();
    assert_eq!(view.welcome.as_deref(), Some("# Welcome"));
    assert!(!view.delete_context_allowed);
}

#[tokio::test]
async fn test_upload_then_chat_streams_answer_with_sources() {
    let server = server(ScriptedChatModel::new(["Refunds ", "take 14 days."]));
    let token = login(&server, "alice", "alice-pw").await;

    let form = MultipartForm::new()
        .add_part(
            "files",
            Part::text("Refunds are processed within 14 days.").file_name("policy.txt"),
        )
        .add_part(
            "files",
            Part::bytes(vec![0x50, 0x4b, 0x03, 0x04]).file_name("contract.docx"),
        );
    let (name, value) = bearer(&token);
    let upload = server
        .post("/v1/context")
        .add_header(name, value)
        .multipart(form)
        .await;
    upload.assert_status_ok();
    let upload = upload.json::<UploadResponse>();
    assert_eq!(upload.total_chunks, 1);
    assert_eq!(upload.files.len(), 2);
    assert_eq!(upload.messages, vec!["1 chunks loaded from text".to_string()]);

    let (name, value) = bearer(&token);
    let response = server
        .post("/v1/chat")
        .add_header(name, value)
        .json(&json!({"question": "What is the refund policy?"}))
        .await;
    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("event: question"));
    assert!(body.contains("event: draft"));
    assert!(body.contains("event: done"));
    assert!(body.contains("policy.txt"));

    let (name, value) = bearer(&token);
    let view = server
        .get("/v1/session")
        .add_header(name, value)
        .await
        .json::<SessionView>();
    assert_eq!(view.messages.len(), 3);
    assert!(view.messages[2].content.starts_with("Refunds take 14 days."));
}

#[tokio::test]
async fn test_upload_larger_than_two_megabytes() {
    let server = server(ScriptedChatModel::new(["ok"]));
    let token = login(&server, "alice", "alice-pw").await;

    let text = "lorem ipsum ".repeat(250_000);
    assert_eq!(text.len(), 3_000_000);
    let form = MultipartForm::new().add_part("files", Part::text(text).file_name("big.txt"));
    let (name, value) = bearer(&token);
    let upload = server
        .post("/v1/context")
        .add_header(name, value)
        .multipart(form)
        .await;

    upload.assert_status_ok();
    // ceil((3_000_000 - 100) / 1400)
    assert_eq!(upload.json::<UploadResponse>().total_chunks, 2143);
}

#[tokio::test]
async fn test_pdf_upload_reports_chunks_loaded_from_pdf() {
    let server = server(ScriptedChatModel::new(["ok"]));
    let token = login(&server, "alice", "alice-pw").await;

    let pdf = pdf_with_pages(&["Refunds take 14 days.", "Shipping is free."]);
    let form = MultipartForm::new().add_part("files", Part::bytes(pdf).file_name("policy.pdf"));
    let (name, value) = bearer(&token);
    let upload = server
        .post("/v1/context")
        .add_header(name, value)
        .multipart(form)
        .await;

    upload.assert_status_ok();
    let upload = upload.json::<UploadResponse>();
    assert_eq!(upload.total_chunks, 2);
    assert_eq!(upload.messages, vec!["2 chunks loaded from PDF".to_string()]);
}

#[tokio::test]
async fn test_empty_question_is_a_bad_request() {
    let server = server(ScriptedChatModel::new(["ok"]));
    let token = login(&server, "alice", "alice-pw").await;
    let (name, value) = bearer(&token);

    server
        .post("/v1/chat")
        .add_header(name, value)
        .json(&json!({"question": "   "}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_context_requires_permission() {
    let server = server(ScriptedChatModel::new(["ok"]));
    let token = login(&server, "bob", "bob-pw").await;
    let (name, value) = bearer(&token);

    server
        .delete("/v1/context")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_context_resets_conversation() {
    let server = server(ScriptedChatModel::new(["ok"]));
    let token = login(&server, "alice", "alice-pw").await;

    let (name, value) = bearer(&token);
    server
        .post("/v1/chat")
        .add_header(name, value)
        .json(&json!({"question": "hello"}))
        .await
        .assert_status_ok();

    let (name, value) = bearer(&token);
    server
        .delete("/v1/context")
        .add_header(name, value)
        .await
        .assert_status_ok();

    let (name, value) = bearer(&token);
    let view = server
        .get("/v1/session")
        .add_header(name, value)
        .await
        .json::<SessionView>();
    assert_eq!(view.messages.len(), 1);
}

#[tokio::test]
async fn test_delete_memory() {
    let server = server(ScriptedChatModel::new(["ok"]));
    let token = login(&server, "alice", "alice-pw").await;
    let (name, value) = bearer(&token);

    let response = server.delete("/v1/memory").add_header(name, value).await;
    response.assert_status_ok();
    assert!(response.text().contains("Deleting memory..."));
}

#[tokio::test]
async fn test_logout_ends_session_and_clears_cache() {
    let server = server(ScriptedChatModel::new(["ok"]));
    let token = login(&server, "alice", "alice-pw").await;

    let (name, value) = bearer(&token);
    server
        .post("/v1/chat")
        .add_header(name, value)
        .json(&json!({"question": "hello"}))
        .await
        .assert_status_ok();
    let stats = server.get("/stats").await.json::<serde_json::Value>();
    assert!(stats["cache"]["total_entries"].as_u64().unwrap() > 0);

    let (name, value) = bearer(&token);
    server
        .post("/v1/logout")
        .add_header(name, value)
        .await
        .assert_status_ok();

    let stats = server.get("/stats").await.json::<serde_json::Value>();
    assert_eq!(stats["cache"]["total_entries"], 0);
    assert_eq!(stats["active_sessions"], 0);

    let (name, value) = bearer(&token);
    server
        .get("/v1/session")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_sessions_are_rejected_and_swept() {
    let catalog = Catalog::from_csv(LOCALIZATION, RAILS, "content").unwrap();
    let state = app_state(
        ScriptedChatModel::new(["ok"]),
        catalog,
        "[auth]\ntoken_expiry_hours = 0",
    );
    let server = TestServer::new(create_app(state.clone())).unwrap();

    let token = login(&server, "alice", "alice-pw").await;
    let (name, value) = bearer(&token);
    server
        .get("/v1/session")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let live = state.sessions.create_session("bob", "en_US", "Welcome");
    let key = live.session_key();
    state.resources.memory(&key).await.unwrap();
    assert!(state.resources.cache().contains(&ResourceKey::scoped("memory", key.clone())));

    assert_eq!(state.sweep_expired_sessions(), 2);
    assert_eq!(state.sessions.count(), 0);
    assert!(!state.resources.cache().contains(&ResourceKey::scoped("memory", key)));
}
