//! Runtime configuration, read from the environment at startup.

use std::path::Path;

use serde::Deserialize;
use uuid::Uuid;

use crate::storage::Store;
use crate::types::{Course, CourseModule, Lesson};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub jwt_secret: String,
    pub site_name: String,
    /// Webhook the notification dispatcher posts to; absent selects the
    /// log-only dispatcher.
    pub notify_webhook_url: Option<String>,
    /// Optional YAML course catalog loaded into the store at startup.
    pub catalog_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            jwt_secret: "dev-secret-change-me".to_string(),
            site_name: "CourseGate".to_string(),
            notify_webhook_url: None,
            catalog_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                log::warn!("JWT_SECRET not set; using the development secret");
                defaults.jwt_secret
            }
        };
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            jwt_secret,
            site_name: std::env::var("SITE_NAME").unwrap_or(defaults.site_name),
            notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL").ok().filter(|u| !u.is_empty()),
            catalog_path: std::env::var("CATALOG_PATH").ok().filter(|p| !p.is_empty()),
        }
    }
}

/// YAML shape of the seeded course catalog. Courses, modules and lessons
/// are externally managed content; the engine only needs their structure.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub courses: Vec<CatalogCourse>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogCourse {
    pub id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub modules: Vec<CatalogModule>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogModule {
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<String>,
}

impl CatalogFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Seed the store with the catalog's courses; returns the course ids.
    pub async fn apply(self, store: &dyn Store) -> anyhow::Result<Vec<Uuid>> {
        let mut seeded = Vec::with_capacity(self.courses.len());
        for course in self.courses {
            let course_id = course.id.unwrap_or_else(Uuid::new_v4);
            let modules = course
                .modules
                .into_iter()
                .enumerate()
                .map(|(module_idx, module)| {
                    let module_id = Uuid::new_v4();
                    let lessons = module
                        .lessons
                        .into_iter()
                        .enumerate()
                        .map(|(lesson_idx, title)| Lesson {
                            id: Uuid::new_v4(),
                            module_id,
                            title,
                            position: lesson_idx as u32,
                        })
                        .collect();
                    (
                        CourseModule {
                            id: module_id,
                            course_id,
                            title: module.title,
                            position: module_idx as u32,
                        },
                        lessons,
                    )
                })
                .collect();
            store
                .insert_course(
                    Course {
                        id: course_id,
                        title: course.title,
                        description: course.description,
                    },
                    modules,
                )
                .await?;
            seeded.push(course_id);
        }
        Ok(seeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn catalog_yaml_seeds_the_store() {
        let yaml = r#"
courses:
  - title: Rust Basics
    description: Introductory track
    modules:
      - title: Getting Started
        lessons:
          - Installing the toolchain
          - Hello, world
      - title: Ownership
        lessons:
          - Moves and borrows
"#;
        let catalog: CatalogFile = serde_yaml::from_str(yaml).unwrap();
        let store = MemoryStore::new();
        let seeded = catalog.apply(&store).await.unwrap();
        assert_eq!(seeded.len(), 1);

        let course = store.course(seeded[0]).await.unwrap().unwrap();
        assert_eq!(course.title, "Rust Basics");

        let outline = store.course_outline(seeded[0]).await.unwrap();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[0].0.title, "Getting Started");
        assert_eq!(outline[0].1.len(), 2);
        assert_eq!(outline[1].1[0].title, "Moves and borrows");

        let lesson_ids = store.lesson_ids_for_course(seeded[0]).await.unwrap();
        assert_eq!(lesson_ids.len(), 3);
    }
}
