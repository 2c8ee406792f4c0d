mod common;

use common::{plain_setup, settings, write_key, ScriptedTransport, AUTHORITY};
use hdl_issuer::{
    CreateOutcome, FailureKind, HandleCreationService, IssuerError, StubHandleService,
    TransportError,
};
use hdl_wire::{AdminRecord, Response, ResponseCode};
use std::sync::Arc;

#[tokio::test]
async fn creates_handle_with_admin_and_description_values() {
    let (_dir, settings, key) = plain_setup();
    let stub = Arc::new(StubHandleService::new());
    assert!(stub.trust_key(AUTHORITY, 300, &key.public_key()));
    let service = HandleCreationService::with_transport(settings, stub.clone());

    let outcome = service.create_handle("abc", "Annual report").await.unwrap();
    assert_eq!(outcome, CreateOutcome::Success("100.1234/abc".into()));

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.request.handle, b"abc");

    let values = &request.request.values;
    assert_eq!(values.len(), 2);
    assert!(values[0].is_type(b"HS_ADMIN"));
    assert_eq!(values[0].index, 100);
    let admin = AdminRecord::from_bytes(&values[0].data).unwrap();
    assert_eq!(admin.admin_handle, AUTHORITY.as_bytes());
    assert_eq!(admin.admin_index, 300);
    assert!(admin.permissions.is_full());

    assert!(values[1].is_type(b"DESC"));
    assert_eq!(values[1].index, 300);
    assert_eq!(values[1].data, b"Annual report");
    assert!(!values[1].permissions.admin);

    let credential = request.credential.as_ref().unwrap();
    assert_eq!(credential.signer_handle, AUTHORITY.as_bytes());
    assert_eq!(credential.signer_index, 300);
}

#[tokio::test]
async fn second_create_of_same_suffix_reports_already_exists() {
    let (_dir, settings, _key) = plain_setup();
    let stub = Arc::new(StubHandleService::new());
    let service = HandleCreationService::with_transport(settings, stub.clone());

    let first = service.create_handle("dup", "one").await.unwrap();
    let second = service.create_handle("dup", "two").await.unwrap();
    assert!(first.is_success());
    assert_eq!(second, CreateOutcome::AlreadyExists);
    assert_eq!(stub.len(), 1);
    assert_eq!(stub.requests().len(), 2);
}

#[tokio::test]
async fn already_exists_is_a_single_attempt() {
    let (_dir, settings, _key) = plain_setup();
    let transport = ScriptedTransport::responding(|id| {
        Response::bare(id, ResponseCode::HandleAlreadyExists)
    });
    let service = HandleCreationService::with_transport(settings, transport.clone());

    let outcome = service.create_handle("taken", "x").await.unwrap();
    assert_eq!(outcome, CreateOutcome::AlreadyExists);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn server_confirmed_handle_is_returned_as_is() {
    let (_dir, settings, _key) = plain_setup();
    let transport = ScriptedTransport::responding(|id| Response::success(id, "100.1234/abc"));
    let service = HandleCreationService::with_transport(settings, transport);

    let outcome = service.create_handle("abc", "x").await.unwrap();
    assert_eq!(outcome.handle(), Some("100.1234/abc"));
}

#[tokio::test]
async fn failure_without_payload_uses_code_message() {
    let (_dir, settings, _key) = plain_setup();
    let transport =
        ScriptedTransport::responding(|id| Response::bare(id, ResponseCode::from_u32(2)));
    let service = HandleCreationService::with_transport(settings, transport);

    let CreateOutcome::Failure(failure) = service.create_handle("abc", "x").await.unwrap() else {
        panic!("expected failure");
    };
    assert_eq!(failure.kind, FailureKind::NoErrorPayload(ResponseCode::Error));
    assert!(failure.reason.contains("unknown error"));
    assert!(failure.reason.contains("without an error payload"));
}

#[tokio::test]
async fn unknown_code_without_payload_still_fails() {
    let (_dir, settings, _key) = plain_setup();
    let transport =
        ScriptedTransport::responding(|id| Response::bare(id, ResponseCode::from_u32(777)));
    let service = HandleCreationService::with_transport(settings, transport);

    let err = service
        .create_handle("abc", "x")
        .await
        .unwrap()
        .into_result()
        .unwrap_err();
    let IssuerError::Protocol(failure) = err else {
        panic!("expected protocol failure");
    };
    assert!(failure.reason.contains("unrecognized response code 777"));
}

#[tokio::test]
async fn server_error_description_is_kept() {
    let (_dir, settings, _key) = plain_setup();
    let transport = ScriptedTransport::responding(|id| {
        Response::error(id, ResponseCode::InsufficientPermissions, "not an admin of 100.1234")
    });
    let service = HandleCreationService::with_transport(settings, transport);

    let CreateOutcome::Failure(failure) = service.create_handle("abc", "x").await.unwrap() else {
        panic!("expected failure");
    };
    assert_eq!(
        failure.kind,
        FailureKind::ErrorResponse(ResponseCode::InsufficientPermissions)
    );
    assert!(failure.reason.contains("not an admin of 100.1234"));
}

#[tokio::test]
async fn transport_fault_is_a_failure_and_does_not_poison_service() {
    let (_dir, settings, _key) = plain_setup();
    let transport = ScriptedTransport::raw(|_| {
        Err(TransportError::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset,
        )))
    });
    let service = HandleCreationService::with_transport(settings, transport.clone());

    for _ in 0..2 {
        let outcome = service.create_handle("abc", "x").await.unwrap();
        assert!(matches!(
            outcome,
            CreateOutcome::Failure(ref failure) if failure.kind == FailureKind::Transport
        ));
    }
    assert_eq!(transport.calls(), 2);
    assert!(service.is_initialized());
}

#[tokio::test]
async fn mismatched_request_id_is_malformed() {
    let (_dir, settings, _key) = plain_setup();
    let transport = ScriptedTransport::responding(|id| Response::success(id + 1, "100.1234/abc"));
    let service = HandleCreationService::with_transport(settings, transport);

    let CreateOutcome::Failure(failure) = service.create_handle("abc", "x").await.unwrap() else {
        panic!("expected failure");
    };
    assert_eq!(failure.kind, FailureKind::MalformedResponse);
}

#[tokio::test]
async fn untrusted_signature_is_rejected_by_server() {
    let (_dir, settings, _key) = plain_setup();
    let stub = Arc::new(StubHandleService::new());
    // A different key is registered for the authority.
    let other = hdl_keys::PrivateKey::from_seed(&[42u8; 32]);
    stub.trust_key(AUTHORITY, 300, &other.public_key());
    let service = HandleCreationService::with_transport(settings, stub.clone());

    let CreateOutcome::Failure(failure) = service.create_handle("abc", "x").await.unwrap() else {
        panic!("expected failure");
    };
    assert_eq!(
        failure.kind,
        FailureKind::ErrorResponse(ResponseCode::AuthenticationFailed)
    );
    assert!(stub.is_empty());
}

#[tokio::test]
async fn invalid_suffix_is_rejected_before_sending() {
    let (_dir, settings, _key) = plain_setup();
    let stub = Arc::new(StubHandleService::new());
    let service = HandleCreationService::with_transport(settings, stub.clone());

    let err = service.create_handle("", "x").await.unwrap_err();
    assert!(matches!(err, IssuerError::InvalidSuffix { .. }));
    assert!(stub.requests().is_empty());

    // The service stays usable.
    assert!(service.create_handle("ok", "x").await.unwrap().is_success());
}

#[tokio::test]
async fn protected_key_without_pass_phrase_fails_at_decrypt() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _key) = write_key(dir.path(), Some("correct horse"));
    let stub = Arc::new(StubHandleService::new());
    let service = HandleCreationService::with_transport(settings(&path, None), stub.clone());

    let err = service.initialize().await.unwrap_err();
    let IssuerError::KeyDecryption(source) = err else {
        panic!("expected decryption error");
    };
    assert!(matches!(source, hdl_keys::KeyError::PassPhraseRequired));
    assert!(service.auth_context().is_none());
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn protected_key_with_wrong_pass_phrase_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _key) = write_key(dir.path(), Some("correct horse"));
    let service = HandleCreationService::with_transport(
        settings(&path, Some("battery staple")),
        Arc::new(StubHandleService::new()),
    );

    let err = service.create_handle("abc", "x").await.unwrap_err();
    assert!(matches!(err, IssuerError::KeyDecryption(_)));
}

#[tokio::test]
async fn protected_key_with_pass_phrase_signs_requests() {
    let dir = tempfile::tempdir().unwrap();
    let (path, key) = write_key(dir.path(), Some("correct horse"));
    let stub = Arc::new(StubHandleService::new());
    stub.trust_key(AUTHORITY, 300, &key.public_key());
    let service =
        HandleCreationService::with_transport(settings(&path, Some("correct horse")), stub);

    let outcome = service.create_handle("abc", "x").await.unwrap();
    assert_eq!(outcome, CreateOutcome::Success("100.1234/abc".into()));
}

#[tokio::test]
async fn empty_authority_never_builds_context() {
    let (_dir, mut settings, _key) = plain_setup();
    settings.naming_authority = Some(String::new());
    let stub = Arc::new(StubHandleService::new());
    let service = HandleCreationService::with_transport(settings, stub.clone());

    let err = service.create_handle("abc", "x").await.unwrap_err();
    assert!(matches!(err, IssuerError::Configuration { .. }));
    assert!(service.auth_context().is_none());
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn concurrent_first_use_initializes_once() {
    let (_dir, settings, _key) = plain_setup();
    let stub = Arc::new(StubHandleService::new());
    let service = Arc::new(HandleCreationService::with_transport(settings, stub.clone()));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            service.create_handle(&format!("item-{i}"), "x").await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_success());
    }
    assert_eq!(stub.len(), 8);

    // Every request was signed by the same context.
    let requests = stub.requests();
    let first_key = service.auth_context().unwrap().public_key();
    assert!(requests
        .iter()
        .all(|r| r.credential.as_ref().unwrap().signer_handle == AUTHORITY.as_bytes()));
    assert_eq!(first_key, service.initialize().await.unwrap().public_key());
}
