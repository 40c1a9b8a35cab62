// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{TimeZone, Utc};
use pb_adapters::{FakeCredentialStore, FakePlatformAdapter, PlatformCall, StoreCall};
use pb_core::{FakeClock, SessionCookie};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Extractor returning a fixed result and counting calls
#[derive(Default)]
struct CountingExtractor {
    result: Option<CredentialSet>,
    calls: AtomicUsize,
}

impl CountingExtractor {
    fn returning(result: Option<CredentialSet>) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialExtractor for CountingExtractor {
    async fn extract(&self, _tenant_id: &str, _handle: &str) -> Option<CredentialSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

fn token(value: &str) -> CredentialSet {
    CredentialSet::new(vec![SessionCookie::new("auth_token", value)])
}

fn login() -> Option<LoginCredentials> {
    Some(LoginCredentials {
        username: "poster".to_string(),
        password: "pw".to_string(),
    })
}

fn clock() -> FakeClock {
    FakeClock::at(Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap())
}

struct Fixture {
    store: FakeCredentialStore,
    platform: FakePlatformAdapter,
    extractor: Arc<CountingExtractor>,
}

impl Fixture {
    fn new(extracted: Option<CredentialSet>) -> Self {
        Self {
            store: FakeCredentialStore::new(),
            platform: FakePlatformAdapter::new(),
            extractor: CountingExtractor::returning(extracted),
        }
    }

    fn resolver(
        &self,
        login: Option<LoginCredentials>,
    ) -> CredentialResolver<FakeCredentialStore, FakePlatformAdapter, FakeClock> {
        CredentialResolver::with_clock(self.store.clone(), self.platform.clone(), clock())
            .with_extractor(self.extractor.clone())
            .with_login(login)
    }
}

#[tokio::test]
async fn stored_session_short_circuits_later_stages() {
    let f = Fixture::new(Some(token("helper")));
    f.store.insert("tenant-a", token("stored"));
    f.platform.accept_token("stored");

    let resolution = f.resolver(login()).resolve("tenant-a", "poster").await.unwrap();

    assert_eq!(resolution.stage, Stage::Stored);
    assert_eq!(resolution.persisted, None);
    assert_eq!(f.extractor.calls(), 0);
    assert_eq!(f.platform.login_count(), 0);
    assert_eq!(f.store.upsert_count(), 0);
}

#[tokio::test]
async fn helper_session_is_verified_and_persisted() {
    let f = Fixture::new(Some(token("helper")));
    f.platform.accept_token("helper");

    let resolution = f.resolver(login()).resolve("tenant-a", "poster").await.unwrap();

    assert_eq!(resolution.stage, Stage::Helper);
    assert_eq!(resolution.persisted, Some(1));
    assert_eq!(f.extractor.calls(), 1);
    assert_eq!(f.platform.login_count(), 0);
    assert_eq!(
        f.store.stored("tenant-a").unwrap().get("auth_token").unwrap().value,
        "helper"
    );
}

#[tokio::test]
async fn stale_stored_session_falls_through_to_helper() {
    let f = Fixture::new(Some(token("helper")));
    f.store.insert("tenant-a", token("stale"));
    f.platform.accept_token("helper");

    let resolution = f.resolver(None).resolve("tenant-a", "poster").await.unwrap();

    assert_eq!(resolution.stage, Stage::Helper);
    assert_eq!(
        f.platform.calls(),
        vec![
            PlatformCall::VerifySession { cookies: 1 },
            PlatformCall::VerifySession { cookies: 1 },
        ]
    );
}

#[tokio::test]
async fn expired_stored_cookies_are_not_verified() {
    let f = Fixture::new(None);
    let expired = SessionCookie::new("auth_token", "stored")
        .expiring_at(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
    f.store.insert("tenant-a", CredentialSet::new(vec![expired]));
    f.platform.accept_token("stored");

    let err = f.resolver(None).resolve("tenant-a", "poster").await.unwrap_err();

    let AuthError::Exhausted { attempts } = err;
    assert_eq!(attempts[0].failure, StageFailure::NoCredentials);
    assert!(f.platform.calls().is_empty());
}

#[tokio::test]
async fn login_is_last_resort() {
    let f = Fixture::new(None);
    f.platform.set_login_result(Some(token("fresh")));
    f.platform.accept_token("fresh");

    let resolution = f.resolver(login()).resolve("tenant-a", "poster").await.unwrap();

    assert_eq!(resolution.stage, Stage::Login);
    assert_eq!(f.extractor.calls(), 1);
    assert_eq!(f.platform.login_count(), 1);
    assert_eq!(
        f.store.calls(),
        vec![
            StoreCall::Load {
                tenant_id: "tenant-a".to_string()
            },
            StoreCall::Upsert {
                tenant_id: "tenant-a".to_string(),
                count: 1
            },
        ]
    );
}

#[tokio::test]
async fn persistence_failure_does_not_fail_resolution() {
    let f = Fixture::new(Some(token("helper")));
    f.platform.accept_token("helper");
    f.store.set_fail_upsert(true);

    let resolution = f.resolver(None).resolve("tenant-a", "poster").await.unwrap();

    assert_eq!(resolution.stage, Stage::Helper);
    assert_eq!(resolution.persisted, None);
}

#[tokio::test]
async fn verification_errors_count_as_unverified() {
    let f = Fixture::new(Some(token("helper")));
    f.store.insert("tenant-a", token("stored"));
    f.platform.set_verify_unreachable(true);

    let err = f.resolver(None).resolve("tenant-a", "poster").await.unwrap_err();

    let AuthError::Exhausted { attempts } = err;
    assert!(matches!(attempts[0].failure, StageFailure::Failed(_)));
    assert!(matches!(attempts[1].failure, StageFailure::Failed(_)));
    assert_eq!(attempts[2].failure, StageFailure::Skipped);
}

#[tokio::test]
async fn all_stages_failing_exhausts() {
    let f = Fixture::new(None);

    let err = f.resolver(login()).resolve("tenant-a", "poster").await.unwrap_err();

    let AuthError::Exhausted { attempts } = &err;
    let stages: Vec<_> = attempts.iter().map(|a| a.stage).collect();
    assert_eq!(stages, vec![Stage::Stored, Stage::Helper, Stage::Login]);
    assert_eq!(
        err.to_string(),
        "authentication exhausted: stored no credentials, helper no credentials, \
         login failed (session rejected)"
    );
}

#[tokio::test]
async fn without_extractor_helper_stage_is_skipped() {
    let store = FakeCredentialStore::new();
    let platform = FakePlatformAdapter::new();
    let resolver = CredentialResolver::with_clock(store, platform, clock());

    let AuthError::Exhausted { attempts } =
        resolver.resolve("tenant-a", "poster").await.unwrap_err();
    assert_eq!(attempts[1].failure, StageFailure::Skipped);
    assert_eq!(attempts[2].failure, StageFailure::Skipped);
}
