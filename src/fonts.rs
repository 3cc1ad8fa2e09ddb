//! Font readiness gate.
//!
//! The font database is loaded once per [`FontLibrary`] on a background
//! thread. Exports wait for it with a bounded timeout. When the wait runs out
//! the export continues with the explicitly configured font files and
//! directories, and later exports pick up the full database once it lands.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use usvg::fontdb::Database;

use crate::config::FontConfig;
use crate::text_metrics::query_face;

static FAMILY_DECL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)font-family\s*:\s*((?:"[^"]*"|'[^']*'|[^;"}<])+)"#).unwrap());
static FAMILY_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)font-family\s*=\s*"([^"]+)""#).unwrap());

const DEFAULT_FAMILIES: [&str; 3] = ["system-ui", "Arial", "sans-serif"];
const GENERIC_FAMILIES: &[&str] = &[
    "serif",
    "sans-serif",
    "monospace",
    "cursive",
    "fantasy",
    "system-ui",
    "-apple-system",
    "ui-sans-serif",
    "ui-monospace",
];

/// Outcome of waiting for the fonts a document references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontReadiness {
    pub ready: Vec<String>,
    pub missing: Vec<String>,
    pub timed_out: bool,
}

/// The readiness report together with the database to measure and draw with.
#[derive(Clone)]
pub struct LoadedFonts {
    pub readiness: FontReadiness,
    pub database: Arc<Database>,
}

enum LoadState {
    Idle,
    Loading,
    Ready(Arc<Database>),
}

struct Shared {
    state: Mutex<LoadState>,
    ready: Condvar,
}

/// Lazily loaded font database shared by all exports of one exporter.
#[derive(Clone)]
pub struct FontLibrary {
    config: FontConfig,
    shared: Arc<Shared>,
}

impl FontLibrary {
    pub fn new(config: FontConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(LoadState::Idle),
                ready: Condvar::new(),
            }),
        }
    }

    /// A library backed by an already populated database. No loading happens.
    pub fn with_database(database: Database) -> Self {
        Self {
            config: FontConfig {
                load_system_fonts: false,
                ..FontConfig::default()
            },
            shared: Arc::new(Shared {
                state: Mutex::new(LoadState::Ready(Arc::new(database))),
                ready: Condvar::new(),
            }),
        }
    }

    pub fn config(&self) -> &FontConfig {
        &self.config
    }

    /// Starts loading if nobody has yet. Returns immediately.
    pub fn request_load(&self) {
        let Ok(mut state) = self.shared.state.lock() else {
            return;
        };
        if !matches!(*state, LoadState::Idle) {
            return;
        }

        #[cfg(target_arch = "wasm32")]
        {
            *state = LoadState::Ready(Arc::new(build_database(&self.config)));
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            *state = LoadState::Loading;
            drop(state);
            let shared = Arc::clone(&self.shared);
            let config = self.config.clone();
            let spawned = std::thread::Builder::new()
                .name("font-loader".to_string())
                .spawn(move || {
                    let database = Arc::new(build_database(&config));
                    if let Ok(mut state) = shared.state.lock() {
                        *state = LoadState::Ready(database);
                    }
                    shared.ready.notify_all();
                });
            if let Err(err) = spawned {
                log::warn!("failed to spawn font loader, loading inline: {err}");
                let database = Arc::new(build_database(&self.config));
                if let Ok(mut state) = self.shared.state.lock() {
                    *state = LoadState::Ready(database);
                }
                self.shared.ready.notify_all();
            }
        }
    }

    /// Waits up to `timeout` for the database. `None` means it is not ready yet.
    pub fn wait_ready(&self, timeout: Duration) -> Option<Arc<Database>> {
        self.request_load();
        let guard = self.shared.state.lock().ok()?;
        let (guard, _) = self
            .shared
            .ready
            .wait_timeout_while(guard, timeout, |state| !matches!(state, LoadState::Ready(_)))
            .ok()?;
        match &*guard {
            LoadState::Ready(database) => Some(Arc::clone(database)),
            _ => None,
        }
    }

    /// Waits for the fonts referenced by `svg`. Never fails: a timeout falls back to
    /// the configured font files and directories.
    pub fn wait_for_fonts(&self, svg: &str) -> LoadedFonts {
        let families = collect_font_families(svg);
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let (database, timed_out) = match self.wait_ready(timeout) {
            Some(database) => (database, false),
            None => (self.fallback_database(), true),
        };

        let mut readiness = FontReadiness {
            timed_out,
            ..FontReadiness::default()
        };
        for family in families {
            if family_available(&database, &family) {
                readiness.ready.push(family);
            } else {
                log::debug!("font family '{family}' is not available");
                readiness.missing.push(family);
            }
        }
        LoadedFonts {
            readiness,
            database,
        }
    }
}

impl FontLibrary {
    fn fallback_database(&self) -> Arc<Database> {
        let database = build_database(&FontConfig {
            load_system_fonts: false,
            ..self.config.clone()
        });
        log::warn!(
            "font database not ready after {} ms, continuing with {} configured face(s)",
            self.config.timeout_ms,
            database.len()
        );
        if database.is_empty() {
            log::warn!("labels will be drawn without text until fonts finish loading");
        }
        Arc::new(database)
    }
}

fn build_database(config: &FontConfig) -> Database {
    let mut db = Database::new();
    if config.load_system_fonts {
        db.load_system_fonts();
    }
    for dir in &config.font_dirs {
        db.load_fonts_dir(dir);
    }
    for file in &config.font_files {
        if let Err(err) = db.load_font_file(file) {
            log::debug!("failed to load font {}: {err}", file.display());
        }
    }
    if let Some(family) = &config.sans_serif_family {
        db.set_sans_serif_family(family.clone());
    }
    log::debug!("font database ready with {} faces", db.len());
    db
}

fn family_available(db: &Database, family: &str) -> bool {
    if GENERIC_FAMILIES.contains(&family.to_ascii_lowercase().as_str()) {
        return query_face(db, family, 400).is_some();
    }
    db.faces().any(|face| {
        face.families
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(family))
    })
}

/// Every font family named in `font-family` declarations or attributes, in first-seen order.
pub fn collect_font_families(svg: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut families = Vec::new();
    let found = FAMILY_DECL_RE
        .captures_iter(svg)
        .chain(FAMILY_ATTR_RE.captures_iter(svg))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()));
    for list in found {
        for name in list.split(',') {
            let name = name.trim().trim_matches(|c| c == '"' || c == '\'').trim();
            if !name.is_empty() && seen.insert(name.to_string()) {
                families.push(name.to_string());
            }
        }
    }
    if families.is_empty() {
        families = DEFAULT_FAMILIES.iter().map(|f| f.to_string()).collect();
    }
    families
}
