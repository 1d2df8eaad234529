//! Scenario tests across use cases, stores and the HTTP surface

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use platform::clock::ManualClock;
use platform::cookie::SameSite;
use platform::mail::{LogMailSender, MailError, MailMessage, MailSender, MailTransport};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::application::{
    AccountManager, ChangePasswordUseCase, IdentifierMode, MailSettings, PasswordHasher,
    RegisterInput, ResetPasswordUseCase, SessionManager, SignInInput, SignInUseCase,
    SignOutUseCase,
};
use crate::domain::entity::{Account, AccountChanges};
use crate::domain::repository::{
    AccountRepository, Document, DocumentStore, Filter, StoredDocument,
};
use crate::domain::value_object::{AppData, Email, RawPassword, Role, SessionToken, UserId};
use crate::presentation::{AuthAppState, auth_router_with_state};
use crate::{AuthConfig, AuthError, DocumentRepository, MemoryDocumentStore, StoreError};

const T0: i64 = 1_760_000_000_000;
const PASSWORD: &str = "Correct-Horse-9";

type Repo = DocumentRepository<MemoryDocumentStore>;

struct Fixture {
    store: MemoryDocumentStore,
    repo: Arc<Repo>,
    config: Arc<AuthConfig>,
    clock: Arc<ManualClock>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(AuthConfig::development())
    }

    fn with_config(config: AuthConfig) -> Self {
        let store = MemoryDocumentStore::new().with_unique_field("users", "email");
        Self::with_store(store, config)
    }

    fn with_store(store: MemoryDocumentStore, config: AuthConfig) -> Self {
        let config = Arc::new(config);
        Self {
            repo: Arc::new(DocumentRepository::new(store.clone(), config.clone())),
            store,
            config,
            clock: Arc::new(ManualClock::new(T0)),
        }
    }

    fn accounts(&self) -> AccountManager<Repo> {
        AccountManager::new(self.repo.clone(), self.config.clone())
    }

    fn sessions(&self) -> SessionManager<Repo> {
        SessionManager::new(self.repo.clone(), self.config.clone()).with_clock(self.clock.clone())
    }

    fn sign_in_use_case(&self) -> SignInUseCase<Repo, Repo> {
        SignInUseCase::new(self.repo.clone(), self.sessions(), self.config.clone())
    }

    async fn register(&self, email: &str, role: Option<&str>) {
        self.accounts()
            .register(RegisterInput {
                email: email.to_string(),
                password: PASSWORD.to_string(),
                user_id: None,
                role: role.map(str::to_string),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                data: AppData::new(json!({"plan": "basic"})),
                ip: Some("10.0.0.7".to_string()),
            })
            .await
            .unwrap();
    }

    async fn register_approved(&self, email: &str, role: Option<&str>) {
        self.register(email, role).await;
        self.accounts().set_approval(email, true).await.unwrap();
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionToken, AuthError> {
        let output = self
            .sign_in_use_case()
            .execute(SignInInput {
                email: email.to_string(),
                password: password.to_string(),
                ip: None,
            })
            .await?;
        Ok(SessionToken::from_client(output.cookie.value).unwrap())
    }

    /// Session manager over the same data whose deletes fail after `deletes` calls
    fn sessions_failing_after(
        &self,
        deletes: usize,
    ) -> SessionManager<DocumentRepository<FailingDeleteStore>> {
        let store = FailingDeleteStore::new(self.store.clone(), deletes);
        SessionManager::new(
            Arc::new(DocumentRepository::new(store, self.config.clone())),
            self.config.clone(),
        )
        .with_clock(self.clock.clone())
    }

    async fn stored_hash(&self, email: &str) -> String {
        let found = self.accounts().find_by_email(email).await.unwrap();
        found.account.password.as_phc_string().to_string()
    }
}

/// Memory store whose `delete_by_key` fails once its allowance is spent
#[derive(Clone)]
struct FailingDeleteStore {
    inner: MemoryDocumentStore,
    deletes_left: Arc<AtomicUsize>,
}

impl FailingDeleteStore {
    fn new(inner: MemoryDocumentStore, deletes: usize) -> Self {
        Self {
            inner,
            deletes_left: Arc::new(AtomicUsize::new(deletes)),
        }
    }
}

impl DocumentStore for FailingDeleteStore {
    async fn get_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.inner.get_by_field(collection, field, value).await
    }

    async fn get_by_key(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<StoredDocument>, StoreError> {
        self.inner.get_by_key(collection, key).await
    }

    async fn insert(&self, collection: &str, body: Document) -> Result<String, StoreError> {
        self.inner.insert(collection, body).await
    }

    async fn insert_at(&self, collection: &str, key: &str, body: Document) -> Result<(), StoreError> {
        self.inner.insert_at(collection, key, body).await
    }

    async fn merge_update(
        &self,
        collection: &str,
        key: &str,
        partial: Document,
    ) -> Result<(), StoreError> {
        self.inner.merge_update(collection, key, partial).await
    }

    async fn delete_by_key(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        let allowed = self
            .deletes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.delete_by_key(collection, key).await
    }

    async fn delete_all_matching(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.inner.delete_all_matching(collection, filter).await
    }

    async fn find_matching(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.inner.find_matching(collection, filter).await
    }
}

// ============================================================================
// Sign In
// ============================================================================

#[tokio::test]
async fn test_register_then_sign_in_after_approval() {
    let fx = Fixture::new();
    fx.register("ada@example.com", None).await;

    let err = fx.sign_in("ada@example.com", PASSWORD).await.unwrap_err();
    assert!(matches!(err, AuthError::NotApproved));

    fx.accounts()
        .set_approval("ada@example.com", true)
        .await
        .unwrap();

    let output = fx
        .sign_in_use_case()
        .execute(SignInInput {
            email: "ada@example.com".to_string(),
            password: PASSWORD.to_string(),
            ip: Some("192.0.2.1".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(output.role.as_str(), "user");
    assert_eq!(output.data.as_value(), &json!({"plan": "basic"}));
    assert_eq!(output.cookie.name, "session");
    assert!(output.cookie.http_only);
    assert_eq!(output.cookie.same_site, SameSite::Strict);
    assert_eq!(fx.sessions().removal_cookie().same_site, SameSite::Strict);
    assert_eq!(
        output.cookie.expires.map(|at| at.timestamp_millis()),
        Some(T0 + fx.config.session_ttl_ms())
    );

    let token = SessionToken::from_client(output.cookie.value).unwrap();
    let session = fx.sessions().fetch(&token).await.unwrap();
    assert_eq!(session.email.as_str(), "ada@example.com");
    assert_eq!(session.ip.as_deref(), Some("192.0.2.1"));
}

#[tokio::test]
async fn test_sign_in_check_order() {
    let fx = Fixture::new();

    // empty email wins over everything, even with no account at all
    let err = fx.sign_in("", "").await.unwrap_err();
    assert!(matches!(err, AuthError::NoEmailProvided));

    let err = fx.sign_in("ada@example.com", "").await.unwrap_err();
    assert!(matches!(err, AuthError::NoPasswordProvided));

    let err = fx.sign_in("ada@example.com", PASSWORD).await.unwrap_err();
    assert!(matches!(err, AuthError::NoSuchUser));

    // approval is checked before the password
    fx.register("ada@example.com", None).await;
    let err = fx.sign_in("ada@example.com", "wrong").await.unwrap_err();
    assert!(matches!(err, AuthError::NotApproved));

    fx.accounts()
        .set_approval("ada@example.com", true)
        .await
        .unwrap();
    let err = fx.sign_in("ada@example.com", "wrong").await.unwrap_err();
    assert!(matches!(err, AuthError::WrongPassword));
    assert_eq!(fx.store.count("sessions").await, 0);
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_duplicate_registration() {
    let fx = Fixture::new();
    fx.register("ada@example.com", None).await;

    let err = fx
        .accounts()
        .register(RegisterInput {
            email: "ada@example.com".to_string(),
            password: "Another-Pass-1".to_string(),
            user_id: None,
            role: None,
            first_name: String::new(),
            last_name: String::new(),
            data: AppData::default(),
            ip: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::AlreadyExists));
    assert_eq!(fx.store.count("users").await, 1);
}

#[tokio::test]
async fn test_concurrent_registration_keeps_one_account() {
    let fx = Fixture::new();
    let input = || RegisterInput {
        email: "race@example.com".to_string(),
        password: PASSWORD.to_string(),
        user_id: None,
        role: None,
        first_name: String::new(),
        last_name: String::new(),
        data: AppData::default(),
        ip: None,
    };

    let accounts = fx.accounts();
    let (a, b) = tokio::join!(accounts.register(input()), accounts.register(input()));

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    assert!(matches!(
        a.err().or(b.err()),
        Some(AuthError::AlreadyExists)
    ));
    assert_eq!(fx.store.count("users").await, 1);
}

#[tokio::test]
async fn test_registration_validation() {
    let fx = Fixture::new();
    let input = |email: &str, password: &str| RegisterInput {
        email: email.to_string(),
        password: password.to_string(),
        user_id: None,
        role: None,
        first_name: String::new(),
        last_name: String::new(),
        data: AppData::default(),
        ip: None,
    };

    let err = fx.accounts().register(input("", PASSWORD)).await.unwrap_err();
    assert!(matches!(err, AuthError::NoEmailProvided));

    let err = fx
        .accounts()
        .register(input("not-an-email", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidEmail));

    let err = fx
        .accounts()
        .register(input("ada@example.com", "short"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PasswordPolicy(_)));

    assert_eq!(fx.store.count("users").await, 0);
}

#[tokio::test]
async fn test_explicit_identifier_mode() {
    let fx = Fixture::with_config(AuthConfig {
        identifier_mode: IdentifierMode::Explicit,
        ..AuthConfig::development()
    });
    let input = |user_id: Option<&str>| RegisterInput {
        email: "ada@example.com".to_string(),
        password: PASSWORD.to_string(),
        user_id: user_id.map(str::to_string),
        role: None,
        first_name: String::new(),
        last_name: String::new(),
        data: AppData::default(),
        ip: None,
    };

    let err = fx.accounts().register(input(None)).await.unwrap_err();
    assert!(matches!(err, AuthError::MissingIdentifier));

    let output = fx.accounts().register(input(Some("emp-0042"))).await.unwrap();
    assert_eq!(output.key, "emp-0042");
    assert_eq!(output.user_id.as_str(), "emp-0042");

    let doc = fx.store.get_by_key("users", "emp-0042").await.unwrap();
    assert!(doc.is_some());
}

#[tokio::test]
async fn test_duplicate_accounts_are_reported() {
    // no unique constraint, so a second account can slip in
    let fx = Fixture::with_store(MemoryDocumentStore::new(), AuthConfig::development());
    let hasher = PasswordHasher::new(fx.config.clone());

    for n in 0..2 {
        let account = Account {
            email: Email::new("twin@example.com").unwrap(),
            password: hasher
                .hash(RawPassword::new(PASSWORD.to_string()).unwrap())
                .await
                .unwrap(),
            user_id: UserId::new(format!("twin-{n}")).unwrap(),
            role: Role::default(),
            approved: true,
            first_name: String::new(),
            last_name: String::new(),
            data: AppData::default(),
            ip: None,
        };
        fx.repo.insert(&account).await.unwrap();
    }

    let err = fx
        .accounts()
        .find_by_email("twin@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::DuplicateUser { count: 2 }));

    let err = fx.sign_in("twin@example.com", PASSWORD).await.unwrap_err();
    assert!(matches!(err, AuthError::DuplicateUser { .. }));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_session_expiry_timeline() {
    let fx = Fixture::with_config(AuthConfig {
        session_ttl: Duration::from_secs(60),
        ..AuthConfig::development()
    });
    fx.register_approved("ada@example.com", None).await;

    let token = fx.sign_in("ada@example.com", PASSWORD).await.unwrap();

    fx.clock.set_ms(T0 + 30_000);
    assert!(fx.sessions().fetch(&token).await.is_ok());

    fx.clock.set_ms(T0 + 61_000);
    let err = fx.sessions().fetch(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::ExpiredSession));
    assert_eq!(fx.store.count("sessions").await, 0);

    fx.clock.set_ms(T0 + 62_000);
    let err = fx.sessions().fetch(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::NoSession));
}

#[tokio::test]
async fn test_expired_fetch_reports_failed_purge() {
    let fx = Fixture::with_config(AuthConfig {
        session_ttl: Duration::from_secs(60),
        ..AuthConfig::development()
    });
    fx.register_approved("ada@example.com", None).await;
    let token = fx.sign_in("ada@example.com", PASSWORD).await.unwrap();

    fx.clock.set_ms(T0 + 61_000);
    let err = fx.sessions_failing_after(0).fetch(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::Store(StoreError::Database(_))));
    assert_eq!(fx.store.count("sessions").await, 1);

    // the purge goes through once the store recovers
    let err = fx.sessions().fetch(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::ExpiredSession));
    assert_eq!(fx.store.count("sessions").await, 0);
}

#[tokio::test]
async fn test_expiry_boundary_is_inclusive() {
    let fx = Fixture::with_config(AuthConfig {
        session_ttl: Duration::from_secs(60),
        ..AuthConfig::development()
    });
    fx.register_approved("ada@example.com", None).await;
    let token = fx.sign_in("ada@example.com", PASSWORD).await.unwrap();

    fx.clock.set_ms(T0 + 60_000);
    let err = fx.sessions().fetch(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::ExpiredSession));
}

#[tokio::test]
async fn test_sweep_deletes_only_expired() {
    let fx = Fixture::with_config(AuthConfig {
        session_ttl: Duration::from_secs(60),
        ..AuthConfig::development()
    });
    fx.register_approved("ada@example.com", None).await;
    fx.register_approved("grace@example.com", None).await;

    let old = fx.sign_in("ada@example.com", PASSWORD).await.unwrap();
    fx.clock.advance_secs(30);
    let fresh = fx.sign_in("grace@example.com", PASSWORD).await.unwrap();

    fx.clock.set_ms(T0 + 70_000);
    assert_eq!(fx.sessions().sweep_expired().await.unwrap(), 1);
    assert_eq!(fx.store.count("sessions").await, 1);

    assert!(matches!(
        fx.sessions().fetch(&old).await,
        Err(AuthError::NoSession)
    ));
    assert!(fx.sessions().fetch(&fresh).await.is_ok());

    // nothing left to do
    assert_eq!(fx.sessions().sweep_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sweep_stops_at_first_failed_delete() {
    let fx = Fixture::with_config(AuthConfig {
        session_ttl: Duration::from_secs(60),
        ..AuthConfig::development()
    });
    for email in ["ada@example.com", "grace@example.com", "alan@example.com"] {
        fx.register_approved(email, None).await;
        fx.sign_in(email, PASSWORD).await.unwrap();
    }
    assert_eq!(fx.store.count("sessions").await, 3);

    fx.clock.set_ms(T0 + 61_000);
    let err = fx.sessions_failing_after(1).sweep_expired().await.unwrap_err();
    assert!(matches!(err, AuthError::Store(StoreError::Database(_))));

    // the delete before the failure is kept, the rest wait for the next sweep
    assert_eq!(fx.store.count("sessions").await, 2);
    assert_eq!(fx.sessions().sweep_expired().await.unwrap(), 2);
    assert_eq!(fx.store.count("sessions").await, 0);
}

#[tokio::test]
async fn test_sign_out_everywhere() {
    let fx = Fixture::new();
    fx.register_approved("ada@example.com", None).await;
    fx.register_approved("grace@example.com", None).await;

    let first = fx.sign_in("ada@example.com", PASSWORD).await.unwrap();
    let _second = fx.sign_in("ada@example.com", PASSWORD).await.unwrap();
    let other = fx.sign_in("grace@example.com", PASSWORD).await.unwrap();
    assert_eq!(fx.store.count("sessions").await, 3);

    let sign_out = SignOutUseCase::new(fx.sessions());
    let deleted = sign_out
        .execute_all(&Email::new("ada@example.com").unwrap())
        .await
        .unwrap();
    assert_eq!(deleted, 2);

    assert!(fx.sessions().fetch(&first).await.is_err());
    assert!(fx.sessions().fetch(&other).await.is_ok());

    // unknown tokens are fine
    sign_out.execute(&first).await.unwrap();
    sign_out.execute(&other).await.unwrap();
    assert_eq!(fx.store.count("sessions").await, 0);
}

#[tokio::test]
async fn test_session_is_a_snapshot() {
    let fx = Fixture::new();
    fx.register_approved("ada@example.com", None).await;
    let before = fx.sign_in("ada@example.com", PASSWORD).await.unwrap();

    fx.accounts()
        .edit(
            "ada@example.com",
            AccountChanges {
                role: Some(Role::new("admin")),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stale = fx.sessions().fetch(&before).await.unwrap();
    assert_eq!(stale.role.as_str(), "user");
    assert!(!fx.sessions().can_access(&stale, ["admin"]));

    let after = fx.sign_in("ada@example.com", PASSWORD).await.unwrap();
    let fresh = fx.sessions().fetch(&after).await.unwrap();
    assert_eq!(fresh.role.as_str(), "admin");
    assert!(fx.sessions().can_access(&fresh, ["editor", "admin"]));
}

// ============================================================================
// Password Lifecycle
// ============================================================================

#[tokio::test]
async fn test_change_password() {
    let fx = Fixture::new();
    fx.register_approved("ada@example.com", None).await;
    let use_case = ChangePasswordUseCase::new(fx.repo.clone(), fx.config.clone());
    let before = fx.stored_hash("ada@example.com").await;

    let err = use_case
        .execute("ada@example.com", "wrong".into(), "Brand-New-Pass-2".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::WrongPassword));
    assert_eq!(fx.stored_hash("ada@example.com").await, before);

    let err = use_case
        .execute("ada@example.com", PASSWORD.into(), "tiny".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PasswordPolicy(_)));
    assert_eq!(fx.stored_hash("ada@example.com").await, before);

    use_case
        .execute("ada@example.com", PASSWORD.into(), "Brand-New-Pass-2".into())
        .await
        .unwrap();
    assert_ne!(fx.stored_hash("ada@example.com").await, before);

    assert!(matches!(
        fx.sign_in("ada@example.com", PASSWORD).await,
        Err(AuthError::WrongPassword)
    ));
    assert!(fx.sign_in("ada@example.com", "Brand-New-Pass-2").await.is_ok());
}

#[tokio::test]
async fn test_reset_password() {
    let fx = Fixture::new();
    fx.register_approved("ada@example.com", None).await;
    let before = fx.stored_hash("ada@example.com").await;

    let use_case =
        ResetPasswordUseCase::new(fx.repo.clone(), Arc::new(LogMailSender), fx.config.clone());
    let temporary = use_case.reset("ada@example.com").await.unwrap();

    assert_eq!(temporary.expose_secret().len(), 6);
    let after = fx.stored_hash("ada@example.com").await;
    assert_ne!(after, before);
    assert_ne!(after, temporary.expose_secret());

    assert!(
        fx.sign_in("ada@example.com", temporary.expose_secret())
            .await
            .is_ok()
    );

    let err = use_case.reset("nobody@example.com").await.unwrap_err();
    assert!(matches!(err, AuthError::NoSuchUser));
}

/// Captures delivered mail
#[derive(Default)]
struct RecordingMailSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl MailSender for RecordingMailSender {
    async fn send(&self, message: &MailMessage, _transport: &MailTransport) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((message.to.clone(), message.body.clone()));
        Ok(())
    }
}

fn mail_settings() -> MailSettings {
    MailSettings {
        transport: MailTransport {
            from: "noreply@example.com".to_string(),
            username: "mailer".to_string(),
            password: "smtp-secret".to_string(),
            host: "smtp.example.com".to_string(),
            port: 587,
        },
        reset_subject: "Your password was reset".to_string(),
    }
}

#[tokio::test]
async fn test_reset_and_notify_mails_temporary_password() {
    let fx = Fixture::with_config(AuthConfig {
        mail: Some(mail_settings()),
        ..AuthConfig::development()
    });
    fx.register_approved("ada@example.com", None).await;

    let mailer = Arc::new(RecordingMailSender::default());
    ResetPasswordUseCase::new(fx.repo.clone(), mailer.clone(), fx.config.clone())
        .reset_and_notify("ada@example.com", "Hello Ada,")
        .await
        .unwrap();

    let sent = mailer.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "ada@example.com");

    let body = &sent[0].1;
    assert!(body.starts_with("Hello Ada,\n\n"));
    let temporary = body
        .lines()
        .find_map(|line| line.strip_prefix("Your temporary password is: "))
        .unwrap();
    assert!(fx.sign_in("ada@example.com", temporary).await.is_ok());
}

#[tokio::test]
async fn test_reset_mail_requires_configuration() {
    let fx = Fixture::new();
    let use_case =
        ResetPasswordUseCase::new(fx.repo.clone(), Arc::new(LogMailSender), fx.config.clone());
    let password = RawPassword::generate(6);

    let err = use_case
        .send_reset_mail("ada@example.com", "Hi", &password)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Mail(MailError::NotConfigured)));
}

#[tokio::test]
async fn test_reset_mail_rejects_bad_recipient() {
    let fx = Fixture::with_config(AuthConfig {
        mail: Some(mail_settings()),
        ..AuthConfig::development()
    });
    let use_case =
        ResetPasswordUseCase::new(fx.repo.clone(), Arc::new(LogMailSender), fx.config.clone());

    let err = use_case
        .send_reset_mail("not-an-address", "Hi", &RawPassword::generate(6))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::Mail(MailError::InvalidRecipient(_))
    ));
}

#[tokio::test]
async fn test_reset_without_mail_keeps_old_password() {
    let fx = Fixture::new();
    fx.register_approved("ada@example.com", None).await;
    let before = fx.stored_hash("ada@example.com").await;

    let mailer = Arc::new(RecordingMailSender::default());
    let err = ResetPasswordUseCase::new(fx.repo.clone(), mailer.clone(), fx.config.clone())
        .reset_and_notify("ada@example.com", "Hello Ada,")
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Mail(MailError::NotConfigured)));
    assert!(mailer.sent.lock().unwrap().is_empty());
    assert_eq!(fx.stored_hash("ada@example.com").await, before);
    assert!(fx.sign_in("ada@example.com", PASSWORD).await.is_ok());
}

/// Transport that is always down
struct UnreachableMailSender;

impl MailSender for UnreachableMailSender {
    async fn send(&self, _message: &MailMessage, transport: &MailTransport) -> Result<(), MailError> {
        Err(MailError::Delivery(format!(
            "connection refused: {}",
            transport.endpoint()
        )))
    }
}

#[tokio::test]
async fn test_failed_delivery_keeps_old_password() {
    let fx = Fixture::with_config(AuthConfig {
        mail: Some(mail_settings()),
        ..AuthConfig::development()
    });
    fx.register_approved("ada@example.com", None).await;
    let before = fx.stored_hash("ada@example.com").await;

    let err = ResetPasswordUseCase::new(
        fx.repo.clone(),
        Arc::new(UnreachableMailSender),
        fx.config.clone(),
    )
    .reset_and_notify("ada@example.com", "Hello Ada,")
    .await
    .unwrap_err();

    assert!(matches!(err, AuthError::Mail(MailError::Delivery(_))));
    assert_eq!(fx.stored_hash("ada@example.com").await, before);
    assert!(fx.sign_in("ada@example.com", PASSWORD).await.is_ok());
}

// ============================================================================
// HTTP Surface
// ============================================================================

fn app(fx: &Fixture) -> axum::Router {
    let state = AuthAppState::new((*fx.repo).clone(), LogMailSender, (*fx.config).clone())
        .with_clock(fx.clock.clone());
    auth_router_with_state(state)
}

fn session_cookie(token: &SessionToken) -> String {
    format!("session={}", token.as_str())
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_guard_without_cookie_is_unauthorized() {
    let fx = Fixture::new();

    let response = app(&fx)
        .oneshot(Request::get("/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::LOCATION], "/login");
    let cookies: Vec<_> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("flash=")));
}

#[tokio::test]
async fn test_guard_with_unknown_session_is_forbidden() {
    let fx = Fixture::new();

    let response = app(&fx)
        .oneshot(
            Request::get("/me")
                .header(header::COOKIE, "session=nonsense")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()[header::LOCATION], "/login");
    let clears_session = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().unwrap().starts_with("session=;"));
    assert!(clears_session);
}

#[tokio::test]
async fn test_guard_with_expired_session_is_forbidden() {
    let fx = Fixture::new();
    fx.register_approved("ada@example.com", None).await;
    let token = fx.sign_in("ada@example.com", PASSWORD).await.unwrap();

    fx.clock.advance_secs(2 * 24 * 3600);
    let response = app(&fx)
        .oneshot(
            Request::get("/me")
                .header(header::COOKIE, session_cookie(&token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(fx.store.count("sessions").await, 0);
}

#[tokio::test]
async fn test_guard_role_mismatch_returns_to_referer() {
    let fx = Fixture::new();
    fx.register_approved("ada@example.com", None).await;
    let token = fx.sign_in("ada@example.com", PASSWORD).await.unwrap();

    let response = app(&fx)
        .oneshot(
            Request::post("/admin/sessions/sweep")
                .header(header::COOKIE, session_cookie(&token))
                .header(header::REFERER, "/dashboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()[header::LOCATION], "/dashboard");

    let response = app(&fx)
        .oneshot(
            Request::post("/admin/sessions/sweep")
                .header(header::COOKIE, session_cookie(&token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()[header::LOCATION], "/");
}

#[tokio::test]
async fn test_guard_authorized_member() {
    let fx = Fixture::new();
    fx.register_approved("ada@example.com", None).await;
    let token = fx.sign_in("ada@example.com", PASSWORD).await.unwrap();

    let response = app(&fx)
        .oneshot(
            Request::get("/me")
                .header(header::COOKIE, session_cookie(&token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["role"], "user");
    assert_eq!(body["data"], json!({"plan": "basic"}));
}

#[tokio::test]
async fn test_admin_can_approve_over_http() {
    let fx = Fixture::new();
    fx.register_approved("root@example.com", Some("admin")).await;
    fx.register("ada@example.com", None).await;
    let token = fx.sign_in("root@example.com", PASSWORD).await.unwrap();

    let response = app(&fx)
        .oneshot(
            Request::post("/admin/approve")
                .header(header::COOKIE, session_cookie(&token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"ada@example.com"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(fx.sign_in("ada@example.com", PASSWORD).await.is_ok());
}

#[tokio::test]
async fn test_sign_in_over_http() {
    let fx = Fixture::new();
    fx.register_approved("ada@example.com", None).await;

    let response = app(&fx)
        .oneshot(
            Request::post("/signin")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"email": "ada@example.com", "password": PASSWORD}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));

    let body = json_body(response).await;
    assert_eq!(body["redirectTo"], "/");
    assert_eq!(fx.store.count("sessions").await, 1);
}

#[tokio::test]
async fn test_wrong_password_over_http() {
    let fx = Fixture::new();
    fx.register_approved("ada@example.com", None).await;

    let response = app(&fx)
        .oneshot(
            Request::post("/signin")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"email": "ada@example.com", "password": "nope"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_sign_out_over_http() {
    let fx = Fixture::new();
    fx.register_approved("ada@example.com", None).await;
    let token = fx.sign_in("ada@example.com", PASSWORD).await.unwrap();

    let response = app(&fx)
        .oneshot(
            Request::post("/signout")
                .header(header::COOKIE, session_cookie(&token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(
        response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0")
    );
    assert_eq!(fx.store.count("sessions").await, 0);
}
