#![allow(dead_code)]

use std::sync::Arc;

use chrono::FixedOffset;
use sambung_ayat::content::{StaticCorpus, Verse};
use sambung_ayat::db::{models::UserRecord, Db};
use sambung_ayat::services::identity::AccountProfile;
use sambung_ayat::AppState;

pub const CALLBACK_SECRET: &str = "test-callback-secret";

pub async fn create_test_db() -> Db {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let path =
        std::env::temp_dir().join(format!("sambung_ayat_test_{}_{}.db", std::process::id(), id));
    // Clean up leftover file from previous runs
    let _ = std::fs::remove_file(&path);
    let url = format!("sqlite://{}?mode=rwc", path.display());
    Db::new(url).await.expect("failed to create test database")
}

/// Consecutive verses built from surah lengths. Every juz holds two surahs
/// and verse text is `"s{surah}:{index}"`.
pub fn corpus(surah_lengths: &[u16]) -> StaticCorpus {
    let mut verses = Vec::new();
    let mut id = 0u32;
    for (i, &len) in surah_lengths.iter().enumerate() {
        let surah_id = i as u16 + 1;
        for index in 1..=len {
            id += 1;
            verses.push(Verse {
                id,
                text: format!("s{surah_id}:{index}"),
                surah_id,
                surah_name: format!("surah {surah_id}"),
                surah_english_name: format!("Surah {surah_id}"),
                index_in_surah: index,
                surah_length: len,
                juz: (i / 2) as u8 + 1,
            });
        }
    }
    StaticCorpus::new(verses)
}

/// Twelve surahs of eight verses across six juz.
pub fn default_corpus() -> StaticCorpus {
    corpus(&[8; 12])
}

pub fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

pub fn app_state(db: Db) -> AppState {
    AppState::new(
        db,
        Arc::new(default_corpus()),
        utc(),
        false,
        CALLBACK_SECRET.to_string(),
    )
}

pub async fn create_account(db: &Db, account_id: &str) -> UserRecord {
    db.ensure_account(&AccountProfile {
        account_id: account_id.to_string(),
        email: Some(format!("{account_id}@example.com")),
        display_name: None,
    })
    .await
    .expect("create account")
}

/// An account plus a login token for its `user_session` cookie.
pub async fn signed_in(db: &Db, account_id: &str) -> (UserRecord, String) {
    let user = create_account(db, account_id).await;
    let token = db
        .create_login_session(&user.id)
        .await
        .expect("create login session");
    (user, token)
}
