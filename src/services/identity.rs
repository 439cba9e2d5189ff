use std::future::Future;

use color_eyre::Result;
use rand::Rng;
use ulid::Ulid;

use crate::db::models::UserRecord;
use crate::db::Db;
use crate::names;

// ---------------------------------------------------------------------------
// IdentityRepository trait
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait IdentityRepository: Send + Sync {
    fn find_user(&self, user_id: &str)
        -> impl Future<Output = Result<Option<UserRecord>>> + Send;

    /// Returns the guest row, creating it with `display_name` if missing.
    fn ensure_guest(
        &self,
        guest_id: &str,
        display_name: &str,
    ) -> impl Future<Output = Result<UserRecord>> + Send;

    /// Returns the account row, creating it if missing and filling a missing
    /// email or display name.
    fn ensure_account(
        &self,
        profile: AccountProfile,
    ) -> impl Future<Output = Result<UserRecord>> + Send;

    /// Folds the guest's history into the account and deletes the guest.
    /// Returns false when there was no guest row to merge.
    fn merge_guest(
        &self,
        guest_id: &str,
        account_id: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn create_login_session(&self, user_id: &str)
        -> impl Future<Output = Result<String>> + Send;

    fn user_by_login_session(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>>> + Send;

    fn delete_login_session(&self, token: &str) -> impl Future<Output = Result<()>> + Send;

    fn set_display_name(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete_user(&self, user_id: &str) -> impl Future<Output = Result<bool>> + Send;
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What the external identity provider tells us about a signed-in account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountProfile {
    pub account_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Clone, Debug)]
pub enum CurrentUser {
    Guest(UserRecord),
    Authenticated(UserRecord),
}

impl CurrentUser {
    pub fn record(&self) -> &UserRecord {
        match self {
            CurrentUser::Guest(user) | CurrentUser::Authenticated(user) => user,
        }
    }

}

pub enum SignInOutcome {
    SignedIn {
        login_token: String,
        user: UserRecord,
        merged_guest: bool,
    },
    MissingAccountId,
    /// The account id names an existing guest row.
    AccountIsGuest,
}

pub enum DisplayNameOutcome {
    Updated(String),
    Empty,
    TooLong,
}

// ---------------------------------------------------------------------------
// IdentityService
// ---------------------------------------------------------------------------

pub struct IdentityService<R: IdentityRepository = Db> {
    repo: R,
}

impl<R: IdentityRepository + Clone> Clone for IdentityService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

impl<R: IdentityRepository> IdentityService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// A valid login session wins over a guest cookie. Guest rows are created
    /// on first sight of a well-formed guest id.
    pub async fn resolve(
        &self,
        login_token: Option<&str>,
        guest_id: Option<&str>,
    ) -> Result<Option<CurrentUser>> {
        if let Some(token) = login_token {
            if let Some(user) = self.repo.user_by_login_session(token).await? {
                if !user.is_guest {
                    return Ok(Some(CurrentUser::Authenticated(user)));
                }
            }
        }

        let Some(guest_id) = guest_id.filter(|id| Ulid::from_string(id).is_ok()) else {
            return Ok(None);
        };

        let user = self.repo.ensure_guest(guest_id, &guest_display_name()).await?;
        if !user.is_guest {
            return Ok(None);
        }
        Ok(Some(CurrentUser::Guest(user)))
    }

    pub async fn sign_in(
        &self,
        profile: AccountProfile,
        guest_id: Option<&str>,
    ) -> Result<SignInOutcome> {
        let account_id = profile.account_id.trim().to_string();
        if account_id.is_empty() {
            return Ok(SignInOutcome::MissingAccountId);
        }

        if let Some(existing) = self.repo.find_user(&account_id).await? {
            if existing.is_guest {
                return Ok(SignInOutcome::AccountIsGuest);
            }
        }

        let profile = AccountProfile {
            account_id: account_id.clone(),
            email: profile.email.filter(|e| !e.trim().is_empty()),
            display_name: profile
                .display_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty() && n.chars().count() <= names::MAX_DISPLAY_NAME_CHARS),
        };
        self.repo.ensure_account(profile).await?;

        let mut merged_guest = false;
        if let Some(guest_id) = guest_id.filter(|id| *id != account_id) {
            merged_guest = self.repo.merge_guest(guest_id, &account_id).await?;
        }

        // Reloaded so merged totals are visible to the caller
        let user = self
            .repo
            .find_user(&account_id)
            .await?
            .ok_or_else(|| color_eyre::eyre::eyre!("account vanished after sign-in"))?;

        let login_token = self.repo.create_login_session(&account_id).await?;

        tracing::info!(user_id = %account_id, merged_guest, "account signed in");
        Ok(SignInOutcome::SignedIn {
            login_token,
            user,
            merged_guest,
        })
    }

    pub async fn sign_out(&self, login_token: &str) -> Result<()> {
        self.repo.delete_login_session(login_token).await
    }

    pub async fn update_display_name(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> Result<DisplayNameOutcome> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Ok(DisplayNameOutcome::Empty);
        }
        if display_name.chars().count() > names::MAX_DISPLAY_NAME_CHARS {
            return Ok(DisplayNameOutcome::TooLong);
        }

        self.repo.set_display_name(user_id, display_name).await?;
        Ok(DisplayNameOutcome::Updated(display_name.to_string()))
    }

    pub async fn delete_account(&self, user_id: &str) -> Result<bool> {
        self.repo.delete_user(user_id).await
    }
}

fn guest_display_name() -> String {
    format!("{}-{:04}", names::GUEST_NAME_PREFIX, rand::thread_rng().gen_range(0..10_000))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
