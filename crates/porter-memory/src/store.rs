//! SQLite-backed persistence for sessions, learning rules, and
//! portfolio content.
//!
//! rusqlite is synchronous, so every query runs inside
//! `spawn_blocking` with the connection behind a `Mutex`. Write volume
//! is one row per chat turn, which a single connection handles fine.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use porter_schema::{
    About, BlogPost, LearningRule, Platform, Profile, Project, Service, Skill, Stage,
};

use crate::migrations::run_migrations;
use crate::StoreError;

/// One visitor's conversation state, as stored.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_key: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub stage: Stage,
    pub pending_requirement: Option<String>,
    pub requirement_confirmed: bool,
    pub platform: Option<Platform>,
    pub message_count: i64,
    /// Recent turns as "role: text" lines, newest last.
    pub messages: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(session_key: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            name: None,
            email: None,
            stage: Stage::AskName,
            pending_requirement: None,
            requirement_confirmed: false,
            platform: None,
            message_count: 0,
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&conn)
        })
        .await?
    }

    // ---------------- sessions ----------------

    pub async fn get_session(&self, session_key: &str) -> Result<Option<SessionRecord>, StoreError> {
        let key = session_key.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT session_key, name, email, stage, pending_requirement,
                        requirement_confirmed, platform, message_count, messages, created_at
                 FROM sessions WHERE session_key = ?1",
                [&key],
                session_from_row,
            )
            .optional()
            .map_err(StoreError::from)?
            .transpose()
        })
        .await
    }

    pub async fn upsert_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let record = record.clone();
        self.with_conn(move |conn| {
            let messages = serde_json::to_string(&record.messages)?;
            conn.execute(
                "INSERT INTO sessions (session_key, name, email, stage, pending_requirement,
                                       requirement_confirmed, platform, message_count,
                                       messages, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(session_key) DO UPDATE SET
                     name = excluded.name,
                     email = excluded.email,
                     stage = excluded.stage,
                     pending_requirement = excluded.pending_requirement,
                     requirement_confirmed = excluded.requirement_confirmed,
                     platform = excluded.platform,
                     message_count = excluded.message_count,
                     messages = excluded.messages",
                params![
                    record.session_key,
                    record.name,
                    record.email,
                    record.stage.as_str(),
                    record.pending_requirement,
                    record.requirement_confirmed as i64,
                    record.platform.map(|p| p.as_str()),
                    record.message_count,
                    messages,
                    record.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn delete_session(&self, session_key: &str) -> Result<(), StoreError> {
        let key = session_key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM sessions WHERE session_key = ?1", [&key])?;
            Ok(())
        })
        .await
    }

    // ---------------- learning rules ----------------

    /// Insert a rule unless one with the same avoid_text already exists.
    /// Returns whether a new row was written.
    pub async fn insert_rule(&self, rule: &LearningRule) -> Result<bool, StoreError> {
        let rule = rule.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO learning_rules
                     (avoid_text, reason, intent, user_message, score, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    rule.avoid_text,
                    rule.reason,
                    rule.intent,
                    rule.user_message,
                    rule.score,
                    rule.created_at.to_rfc3339(),
                ],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    pub async fn list_rules(&self) -> Result<Vec<LearningRule>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT avoid_text, reason, intent, user_message, score, created_at
                 FROM learning_rules ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?;
            let mut rules = Vec::new();
            for row in rows {
                let (avoid_text, reason, intent, user_message, score, created_at) = row?;
                rules.push(LearningRule {
                    avoid_text,
                    reason,
                    intent,
                    user_message,
                    score,
                    created_at: parse_timestamp(&created_at),
                });
            }
            Ok(rules)
        })
        .await
    }

    // ---------------- portfolio content ----------------

    pub async fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        let project = project.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO projects (title, tagline, description, tech_stacks, features, link)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    project.title,
                    project.tagline,
                    project.description,
                    serde_json::to_string(&project.tech_stacks)?,
                    serde_json::to_string(&project.features)?,
                    project.link,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT title, tagline, description, tech_stacks, features, link
                 FROM projects ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?;
            let mut projects = Vec::new();
            for row in rows {
                let (title, tagline, description, tech_stacks, features, link) = row?;
                projects.push(Project {
                    title,
                    tagline,
                    description,
                    tech_stacks: serde_json::from_str(&tech_stacks)?,
                    features: serde_json::from_str(&features)?,
                    link,
                });
            }
            Ok(projects)
        })
        .await
    }

    pub async fn insert_skill(&self, skill: &Skill) -> Result<(), StoreError> {
        let skill = skill.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO skills (name, category) VALUES (?1, ?2)",
                params![skill.name, skill.category],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_skills(&self) -> Result<Vec<Skill>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name, category FROM skills ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok(Skill {
                    name: row.get(0)?,
                    category: row.get(1)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
        .await
    }

    pub async fn insert_service(&self, service: &Service) -> Result<(), StoreError> {
        let service = service.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO services (title, description, is_active) VALUES (?1, ?2, ?3)",
                params![service.title, service.description, service.is_active as i64],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_services(&self, active_only: bool) -> Result<Vec<Service>, StoreError> {
        self.with_conn(move |conn| {
            let sql = if active_only {
                "SELECT title, description, is_active FROM services WHERE is_active = 1 ORDER BY id"
            } else {
                "SELECT title, description, is_active FROM services ORDER BY id"
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([], |row| {
                Ok(Service {
                    title: row.get(0)?,
                    description: row.get(1)?,
                    is_active: row.get::<_, i64>(2)? != 0,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
        .await
    }

    pub async fn set_about(&self, about: &About) -> Result<(), StoreError> {
        let about = about.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO about (id, name, title, description) VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     title = excluded.title,
                     description = excluded.description",
                params![about.name, about.title, about.description],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_about(&self) -> Result<Option<About>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT name, title, description FROM about WHERE id = 1",
                [],
                |row| {
                    Ok(About {
                        name: row.get(0)?,
                        title: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    pub async fn insert_blog_post(&self, post: &BlogPost) -> Result<(), StoreError> {
        let post = post.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO blog_posts (title, slug, body, published_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![post.title, post.slug, post.body, post.published_at.to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_blog_posts(&self) -> Result<Vec<BlogPost>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT title, slug, body, published_at
                 FROM blog_posts ORDER BY published_at DESC",
            )?;
            let rows = stmt.query_map([], blog_post_columns)?;
            let mut posts = Vec::new();
            for row in rows {
                posts.push(blog_post_from_columns(row?));
            }
            Ok(posts)
        })
        .await
    }

    pub async fn get_blog_post(&self, slug: &str) -> Result<Option<BlogPost>, StoreError> {
        let slug = slug.to_string();
        self.with_conn(move |conn| {
            let columns = conn
                .query_row(
                    "SELECT title, slug, body, published_at FROM blog_posts WHERE slug = ?1",
                    [&slug],
                    blog_post_columns,
                )
                .optional()?;
            Ok(columns.map(blog_post_from_columns))
        })
        .await
    }

    /// Snapshot of the portfolio for prompt building. Projects are
    /// capped so the prompt stays small.
    pub async fn profile(&self) -> Result<Profile, StoreError> {
        let about = self.get_about().await?;
        let skills = self.list_skills().await?;
        let mut projects = self.list_projects().await?;
        projects.truncate(5);
        let services = self.list_services(true).await?;

        let intro = match about {
            Some(a) => format!("{}, {}. {}", a.name, a.title, a.description),
            None => String::new(),
        };

        Ok(Profile {
            intro,
            skills: skills.into_iter().map(|s| s.name).collect(),
            projects,
            services,
        })
    }
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Result<SessionRecord, StoreError>> {
    let stage_raw: String = row.get(3)?;
    let platform_raw: Option<String> = row.get(6)?;
    let messages_raw: String = row.get(8)?;
    let created_raw: String = row.get(9)?;

    let messages = match serde_json::from_str(&messages_raw) {
        Ok(messages) => messages,
        Err(e) => return Ok(Err(StoreError::Json(e))),
    };

    Ok(Ok(SessionRecord {
        session_key: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        // Unknown stage values fall back to free chat rather than
        // wedging the session.
        stage: Stage::parse(&stage_raw).unwrap_or(Stage::FreeChat),
        pending_requirement: row.get(4)?,
        requirement_confirmed: row.get::<_, i64>(5)? != 0,
        platform: platform_raw.as_deref().and_then(Platform::parse),
        message_count: row.get(7)?,
        messages,
        created_at: parse_timestamp(&created_raw),
    }))
}

type BlogColumns = (String, String, String, String);

fn blog_post_columns(row: &Row<'_>) -> rusqlite::Result<BlogColumns> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn blog_post_from_columns((title, slug, body, published_at): BlogColumns) -> BlogPost {
    BlogPost {
        title,
        slug,
        body,
        published_at: parse_timestamp(&published_at),
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_upsert_and_fetch() {
        let store = Store::open_in_memory().unwrap();

        let mut record = SessionRecord::new("visitor-1");
        record.name = Some("Alice".into());
        record.stage = Stage::AskEmail;
        record.messages = vec!["user: Hi".into(), "bot: Hello".into()];
        record.message_count = 1;
        store.upsert_session(&record).await.unwrap();

        let fetched = store.get_session("visitor-1").await.unwrap().unwrap();
        assert_eq!(fetched.name.as_deref(), Some("Alice"));
        assert_eq!(fetched.stage, Stage::AskEmail);
        assert_eq!(fetched.messages.len(), 2);
        assert!(!fetched.requirement_confirmed);

        record.stage = Stage::AskNeed;
        record.email = Some("alice@example.com".into());
        store.upsert_session(&record).await.unwrap();

        let updated = store.get_session("visitor-1").await.unwrap().unwrap();
        assert_eq!(updated.stage, Stage::AskNeed);
        assert_eq!(updated.email.as_deref(), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn missing_session_is_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_session("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_session_removes_row() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_session(&SessionRecord::new("visitor-1"))
            .await
            .unwrap();
        store.delete_session("visitor-1").await.unwrap();
        assert!(store.get_session("visitor-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rule_insert_deduplicates_on_avoid_text() {
        let store = Store::open_in_memory().unwrap();
        let rule = LearningRule {
            avoid_text: "I cannot help with that".into(),
            reason: "low implicit score".into(),
            intent: Some("free_chat".into()),
            user_message: Some("can you build apps?".into()),
            score: Some(0.2),
            created_at: Utc::now(),
        };

        assert!(store.insert_rule(&rule).await.unwrap());
        assert!(!store.insert_rule(&rule).await.unwrap());

        let rules = store.list_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].score, Some(0.2));
    }

    #[tokio::test]
    async fn profile_assembles_content() {
        let store = Store::open_in_memory().unwrap();
        store
            .set_about(&About {
                name: "Alex".into(),
                title: "Software Engineer".into(),
                description: "I build web backends.".into(),
            })
            .await
            .unwrap();
        store
            .insert_skill(&Skill {
                name: "Rust".into(),
                category: Some("backend".into()),
            })
            .await
            .unwrap();
        for i in 0..7 {
            store
                .insert_project(&Project {
                    title: format!("Project {i}"),
                    tagline: String::new(),
                    description: "d".into(),
                    tech_stacks: vec!["Rust".into()],
                    features: vec![],
                    link: None,
                })
                .await
                .unwrap();
        }
        store
            .insert_service(&Service {
                title: "Consulting".into(),
                description: "Architecture reviews".into(),
                is_active: true,
            })
            .await
            .unwrap();
        store
            .insert_service(&Service {
                title: "Retired".into(),
                description: "Old offering".into(),
                is_active: false,
            })
            .await
            .unwrap();

        let profile = store.profile().await.unwrap();
        assert!(profile.intro.contains("Alex"));
        assert_eq!(profile.skills, vec!["Rust".to_string()]);
        assert_eq!(profile.projects.len(), 5);
        assert_eq!(profile.services.len(), 1);
        assert_eq!(profile.services[0].title, "Consulting");
    }

    #[tokio::test]
    async fn blog_posts_sort_newest_first_and_fetch_by_slug() {
        let store = Store::open_in_memory().unwrap();
        let older = BlogPost {
            title: "Old".into(),
            slug: "old".into(),
            body: "b".into(),
            published_at: "2025-01-01T00:00:00Z".parse().unwrap(),
        };
        let newer = BlogPost {
            title: "New".into(),
            slug: "new".into(),
            body: "b".into(),
            published_at: "2025-06-01T00:00:00Z".parse().unwrap(),
        };
        store.insert_blog_post(&older).await.unwrap();
        store.insert_blog_post(&newer).await.unwrap();

        let posts = store.list_blog_posts().await.unwrap();
        assert_eq!(posts[0].slug, "new");
        assert_eq!(posts[1].slug, "old");

        let fetched = store.get_blog_post("old").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Old");
        assert!(store.get_blog_post("missing").await.unwrap().is_none());
    }
}
