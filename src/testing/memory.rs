use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering as AtomicOrdering},
        Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use time::{OffsetDateTime, UtcOffset};

use crate::{
    db::DataError,
    filters::{Filters, Metadata, SortDirection, SortKey},
    goals::{
        model::{Goal, GoalFilter, GoalSort},
        repo::GoalRepository,
    },
    permissions::{repo::PermissionRepository, Permissions},
    quotes::{
        model::{Quote, QuoteFilter, QuoteSort},
        repo::QuoteRepository,
    },
    study_sessions::{
        model::{StudySession, StudySessionFilter, StudySessionSort},
        repo::StudySessionRepository,
    },
    tokens::{
        model::{hash_plaintext, Scope, Token},
        repo::TokenRepository,
    },
    users::{
        model::{User, UserFilter, UserSort},
        password::Password,
        repo::UserRepository,
    },
};

/// Codes seeded by the permissions migration.
const CATALOG: &[&str] = &[
    "quotes:read",
    "quotes:write",
    "goals:read",
    "goals:write",
    "study_sessions:read",
    "study_sessions:write",
    "users:read",
    "users:write",
];

struct StoredToken {
    hash: Vec<u8>,
    user_id: i64,
    expiry: OffsetDateTime,
    scope: Scope,
}

#[derive(Default)]
struct Tables {
    sequences: HashMap<&'static str, i64>,
    users: BTreeMap<i64, User>,
    tokens: Vec<StoredToken>,
    grants: HashMap<i64, BTreeSet<String>>,
    quotes: BTreeMap<i64, Quote>,
    goals: BTreeMap<i64, Goal>,
    sessions: BTreeMap<i64, StudySession>,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i64 {
        let id = self.sequences.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn email_taken(&self, email: &str, except: i64) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && u.id != except)
    }
}

/// Every repository trait over in-process maps, following the Postgres
/// implementations' observable behaviour: window counts vanish on empty
/// pages, user writes are version-guarded, deletes cascade from users.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    list_calls: AtomicUsize,
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store mutex poisoned")
    }

    /// Number of `get_all` calls that reached the store.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn user_count(&self) -> usize {
        self.tables().users.len()
    }

    pub fn goal_count(&self) -> usize {
        self.tables().goals.len()
    }

    pub fn permission_codes(&self, user_id: i64) -> Vec<String> {
        self.tables()
            .grants
            .get(&user_id)
            .map(|codes| codes.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn listed(&self) {
        self.list_calls.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Rough `to_tsvector('simple', ..) @@ plainto_tsquery('simple', ..)`.
fn text_matches(haystack: &str, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let haystack = words(haystack);
    words(query).iter().all(|w| haystack.contains(w))
}

fn paginate<T, S: SortKey>(
    mut rows: Vec<T>,
    filters: &Filters<S>,
    compare: impl Fn(&T, &T, S) -> Ordering,
    id: impl Fn(&T) -> i64,
) -> (Vec<T>, Metadata) {
    rows.sort_by(|a, b| {
        let primary = match filters.direction {
            SortDirection::Asc => compare(a, b, filters.sort),
            SortDirection::Desc => compare(a, b, filters.sort).reverse(),
        };
        primary.then_with(|| id(a).cmp(&id(b)))
    });

    let total = rows.len() as i64;
    let page: Vec<T> = rows
        .into_iter()
        .skip(filters.offset() as usize)
        .take(filters.limit() as usize)
        .collect();
    let total = if page.is_empty() { 0 } else { total };
    let metadata = Metadata::calculate(total, filters.page, filters.page_size);
    (page, metadata)
}

fn stored(user: &User) -> User {
    let mut copy = user.clone();
    copy.password = Password::from_hash(user.password.hash().to_string());
    copy
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, user: &mut User) -> Result<(), DataError> {
        let mut t = self.tables();
        if t.email_taken(&user.email, 0) {
            return Err(DataError::DuplicateEmail);
        }
        user.id = t.next_id("users");
        user.version = 1;
        user.created_at = OffsetDateTime::now_utc();
        t.users.insert(user.id, stored(user));
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<User, DataError> {
        self.tables()
            .users
            .get(&id)
            .cloned()
            .ok_or(DataError::RecordNotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, DataError> {
        self.tables()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(DataError::RecordNotFound)
    }

    async fn update(&self, user: &mut User) -> Result<(), DataError> {
        let mut t = self.tables();
        match t.users.get(&user.id) {
            Some(current) if current.version == user.version => {}
            _ => return Err(DataError::EditConflict),
        }
        if t.email_taken(&user.email, user.id) {
            return Err(DataError::DuplicateEmail);
        }
        user.version += 1;
        t.users.insert(user.id, stored(user));
        Ok(())
    }

    async fn activate(&self, user: &mut User) -> Result<(), DataError> {
        let mut t = self.tables();
        let current = match t.users.get_mut(&user.id) {
            Some(current) if current.version == user.version => current,
            _ => return Err(DataError::EditConflict),
        };
        current.activated = true;
        current.version += 1;
        user.activated = true;
        user.version = current.version;
        Ok(())
    }

    async fn update_password(&self, id: i64, password: &Password) -> Result<(), DataError> {
        let mut t = self.tables();
        let current = t.users.get_mut(&id).ok_or(DataError::RecordNotFound)?;
        current.password = Password::from_hash(password.hash().to_string());
        current.version += 1;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), DataError> {
        let mut t = self.tables();
        t.users.remove(&id).ok_or(DataError::RecordNotFound)?;
        t.tokens.retain(|tok| tok.user_id != id);
        t.grants.remove(&id);
        t.quotes.retain(|_, q| q.user_id != id);
        t.goals.retain(|_, g| g.user_id != id);
        t.sessions.retain(|_, s| s.user_id != id);
        Ok(())
    }

    async fn get_all(
        &self,
        filter: &UserFilter,
        filters: &Filters<UserSort>,
    ) -> Result<(Vec<User>, Metadata), DataError> {
        self.listed();
        let rows: Vec<User> = self
            .tables()
            .users
            .values()
            .filter(|u| text_matches(&u.username, &filter.username))
            .filter(|u| filter.email.is_empty() || u.email == filter.email)
            .cloned()
            .collect();
        Ok(paginate(
            rows,
            filters,
            |a, b, sort| match sort {
                UserSort::Id => a.id.cmp(&b.id),
                UserSort::Username => a.username.cmp(&b.username),
                UserSort::Email => a.email.cmp(&b.email),
            },
            |u| u.id,
        ))
    }
}

#[async_trait]
impl TokenRepository for MemoryStore {
    async fn insert(&self, token: &Token) -> Result<(), DataError> {
        self.tables().tokens.push(StoredToken {
            hash: token.hash.clone(),
            user_id: token.user_id,
            expiry: token.expiry,
            scope: token.scope,
        });
        Ok(())
    }

    async fn user_for_token(&self, scope: Scope, plaintext: &str) -> Result<User, DataError> {
        let hash = hash_plaintext(plaintext);
        let now = OffsetDateTime::now_utc();
        let t = self.tables();
        t.tokens
            .iter()
            .find(|tok| tok.hash == hash && tok.scope == scope && tok.expiry > now)
            .and_then(|tok| t.users.get(&tok.user_id).cloned())
            .ok_or(DataError::RecordNotFound)
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), DataError> {
        self.tables()
            .tokens
            .retain(|tok| !(tok.scope == scope && tok.user_id == user_id));
        Ok(())
    }
}

#[async_trait]
impl PermissionRepository for MemoryStore {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, DataError> {
        Ok(self.permission_codes(user_id).into_iter().collect())
    }

    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), DataError> {
        let mut t = self.tables();
        let granted = t.grants.entry(user_id).or_default();
        for code in codes.iter().filter(|c| CATALOG.contains(c)) {
            granted.insert(code.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl QuoteRepository for MemoryStore {
    async fn insert(&self, quote: &mut Quote) -> Result<(), DataError> {
        let mut t = self.tables();
        quote.id = t.next_id("quotes");
        quote.created_at = OffsetDateTime::now_utc();
        t.quotes.insert(quote.id, quote.clone());
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Quote, DataError> {
        let t = self.tables();
        let mut quote = t.quotes.get(&id).cloned().ok_or(DataError::RecordNotFound)?;
        if let Some(author) = t.users.get(&quote.user_id) {
            quote.username = author.username.clone();
        }
        Ok(quote)
    }

    async fn update(&self, quote: &Quote) -> Result<(), DataError> {
        let mut t = self.tables();
        let current = t.quotes.get_mut(&quote.id).ok_or(DataError::RecordNotFound)?;
        current.content = quote.content.clone();
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), DataError> {
        self.tables()
            .quotes
            .remove(&id)
            .map(|_| ())
            .ok_or(DataError::RecordNotFound)
    }

    async fn get_all(
        &self,
        filter: &QuoteFilter,
        filters: &Filters<QuoteSort>,
    ) -> Result<(Vec<Quote>, Metadata), DataError> {
        self.listed();
        let rows: Vec<Quote> = self
            .tables()
            .quotes
            .values()
            .filter(|q| text_matches(&q.content, &filter.content))
            .cloned()
            .collect();
        Ok(paginate(
            rows,
            filters,
            |a, b, sort| match sort {
                QuoteSort::Id => a.id.cmp(&b.id),
                QuoteSort::UserId => a.user_id.cmp(&b.user_id),
                QuoteSort::Content => a.content.cmp(&b.content),
            },
            |q| q.id,
        ))
    }
}

#[async_trait]
impl GoalRepository for MemoryStore {
    async fn insert(&self, goal: &mut Goal) -> Result<(), DataError> {
        let mut t = self.tables();
        goal.id = t.next_id("goals");
        goal.target_date = goal.target_date.to_offset(UtcOffset::UTC);
        goal.created_at = OffsetDateTime::now_utc();
        t.goals.insert(goal.id, goal.clone());
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Goal, DataError> {
        self.tables()
            .goals
            .get(&id)
            .cloned()
            .ok_or(DataError::RecordNotFound)
    }

    async fn update(&self, goal: &Goal) -> Result<(), DataError> {
        let mut t = self.tables();
        let current = t.goals.get_mut(&goal.id).ok_or(DataError::RecordNotFound)?;
        current.goal_text = goal.goal_text.clone();
        current.target_date = goal.target_date.to_offset(UtcOffset::UTC);
        current.is_completed = goal.is_completed;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), DataError> {
        self.tables()
            .goals
            .remove(&id)
            .map(|_| ())
            .ok_or(DataError::RecordNotFound)
    }

    async fn get_all(
        &self,
        filter: &GoalFilter,
        filters: &Filters<GoalSort>,
    ) -> Result<(Vec<Goal>, Metadata), DataError> {
        self.listed();
        let rows: Vec<Goal> = self
            .tables()
            .goals
            .values()
            .filter(|g| text_matches(&g.goal_text, &filter.goal_text))
            .filter(|g| filter.is_completed.map_or(true, |done| g.is_completed == done))
            .filter(|g| {
                filter
                    .target_date
                    .map_or(true, |day| g.target_date.to_offset(UtcOffset::UTC).date() == day)
            })
            .cloned()
            .collect();
        Ok(paginate(
            rows,
            filters,
            |a, b, sort| match sort {
                GoalSort::GoalId => a.id.cmp(&b.id),
                GoalSort::UserId => a.user_id.cmp(&b.user_id),
                GoalSort::GoalText => a.goal_text.cmp(&b.goal_text),
                GoalSort::TargetDate => a.target_date.cmp(&b.target_date),
                GoalSort::IsCompleted => a.is_completed.cmp(&b.is_completed),
            },
            |g| g.id,
        ))
    }
}

#[async_trait]
impl StudySessionRepository for MemoryStore {
    async fn insert(&self, session: &mut StudySession) -> Result<(), DataError> {
        let mut t = self.tables();
        session.id = t.next_id("study_sessions");
        session.created_at = OffsetDateTime::now_utc();
        t.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<StudySession, DataError> {
        self.tables()
            .sessions
            .get(&id)
            .cloned()
            .ok_or(DataError::RecordNotFound)
    }

    async fn update(&self, session: &StudySession) -> Result<(), DataError> {
        let mut t = self.tables();
        let current = t
            .sessions
            .get_mut(&session.id)
            .ok_or(DataError::RecordNotFound)?;
        let created_at = current.created_at;
        *current = session.clone();
        current.created_at = created_at;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), DataError> {
        self.tables()
            .sessions
            .remove(&id)
            .map(|_| ())
            .ok_or(DataError::RecordNotFound)
    }

    async fn get_all(
        &self,
        filter: &StudySessionFilter,
        filters: &Filters<StudySessionSort>,
    ) -> Result<(Vec<StudySession>, Metadata), DataError> {
        self.listed();
        let rows: Vec<StudySession> = self
            .tables()
            .sessions
            .values()
            .filter(|s| text_matches(&s.title, &filter.title))
            .filter(|s| text_matches(&s.subject, &filter.subject))
            .filter(|s| filter.is_completed.map_or(true, |done| s.is_completed == done))
            .cloned()
            .collect();
        Ok(paginate(
            rows,
            filters,
            |a, b, sort| match sort {
                StudySessionSort::SessionId => a.id.cmp(&b.id),
                StudySessionSort::Title => a.title.cmp(&b.title),
                StudySessionSort::Subject => a.subject.cmp(&b.subject),
                StudySessionSort::IsCompleted => a.is_completed.cmp(&b.is_completed),
                StudySessionSort::CreatedAt => a.created_at.cmp(&b.created_at),
            },
            |s| s.id,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_text_emulation() {
        assert!(text_matches("Never give up!", ""));
        assert!(text_matches("Never give up!", "never"));
        assert!(text_matches("Never give up!", "give never"));
        assert!(!text_matches("Never give up!", "nev"));
        assert!(!text_matches("Never give up!", "never surrender"));
    }

    #[tokio::test]
    async fn expired_and_wrong_scope_tokens_are_not_found() {
        let store = MemoryStore::default();
        let mut user = User::new(
            "amy".into(),
            "amy@example.com".into(),
            Password::from_hash("$argon2id$stub".into()),
        );
        UserRepository::insert(&store, &mut user).await.unwrap();

        let mut expired = Token::generate(user.id, std::time::Duration::from_secs(60), Scope::Authentication);
        expired.expiry = OffsetDateTime::now_utc() - time::Duration::minutes(1);
        TokenRepository::insert(&store, &expired).await.unwrap();
        assert!(matches!(
            store.user_for_token(Scope::Authentication, &expired.plaintext).await,
            Err(DataError::RecordNotFound)
        ));

        let live = Token::generate(user.id, std::time::Duration::from_secs(60), Scope::Activation);
        TokenRepository::insert(&store, &live).await.unwrap();
        assert!(store.user_for_token(Scope::Activation, &live.plaintext).await.is_ok());
        assert!(matches!(
            store.user_for_token(Scope::Authentication, &live.plaintext).await,
            Err(DataError::RecordNotFound)
        ));
    }

    #[tokio::test]
    async fn unknown_permission_codes_are_skipped() {
        let store = MemoryStore::default();
        store
            .add_for_user(1, &["goals:read", "admin:everything"])
            .await
            .unwrap();
        store.add_for_user(1, &["goals:read"]).await.unwrap();
        assert_eq!(store.permission_codes(1), vec!["goals:read"]);
    }
}
