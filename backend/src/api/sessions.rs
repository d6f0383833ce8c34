//! Per-user session state.
//!
//! A session holds the two uploaded inputs. Parsing happens outside both
//! locks; the session map and the load cache are only locked to look up,
//! store, or clone `Arc`s out.
//!
//! The map is capped: creating a session past the cap drops the least
//! recently used one.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::cache::{cache_key, LoadCache};
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::models::columns::{COMPENSATION_METRICS, PNAME, POSDATA};
use crate::models::Table;
use crate::parser::ParseResult;
use crate::transform::pipeline::{log_cache_hit, read_upload};

use super::logs::log_info;
use super::types::{SessionState, UploadSummary};

/// Default number of live sessions
pub const DEFAULT_MAX_SESSIONS: usize = 64;

/// Which input an upload fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Posdata,
    Pname,
}

impl Role {
    pub fn table_name(self) -> &'static str {
        match self {
            Role::Posdata => POSDATA,
            Role::Pname => PNAME,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub parsed: Arc<ParseResult>,
    pub cached: bool,
}

impl Upload {
    pub fn table(&self) -> &Table {
        &self.parsed.table
    }

    fn summary(&self, role: Role) -> UploadSummary {
        UploadSummary::new(role.table_name(), &self.file_name, &self.parsed, self.cached)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub posdata: Option<Upload>,
    pub pname: Option<Upload>,
    /// Store tick of the last access
    last_used: u64,
}

impl Session {
    fn new(tick: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            posdata: None,
            pname: None,
            last_used: tick,
        }
    }

    fn slot(&mut self, role: Role) -> &mut Option<Upload> {
        match role {
            Role::Posdata => &mut self.posdata,
            Role::Pname => &mut self.pname,
        }
    }

    fn state(&self) -> SessionState {
        SessionState {
            session_id: self.id.clone(),
            created_at: self.created_at,
            posdata: self.posdata.as_ref().map(|u| u.summary(Role::Posdata)),
            pname: self.pname.as_ref().map(|u| u.summary(Role::Pname)),
            ready: self.posdata.is_some() && self.pname.is_some(),
            group_by_options: self
                .posdata
                .as_ref()
                .map(|u| u.table().columns().to_vec())
                .unwrap_or_default(),
            metric_options: COMPENSATION_METRICS.to_vec(),
        }
    }
}

/// All live sessions plus the shared parse cache.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    cache: Mutex<LoadCache>,
    max_sessions: usize,
    clock: AtomicU64,
}

impl SessionStore {
    pub fn new(cache_capacity: usize, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            cache: Mutex::new(LoadCache::new(cache_capacity)),
            max_sessions: max_sessions.max(1),
            clock: AtomicU64::new(0),
        }
    }

    fn sessions(&self) -> ServerResult<MutexGuard<'_, HashMap<String, Session>>> {
        self.sessions
            .lock()
            .map_err(|_| ServerError::Internal("session store lock poisoned".to_string()))
    }

    fn cache(&self) -> ServerResult<MutexGuard<'_, LoadCache>> {
        self.cache
            .lock()
            .map_err(|_| ServerError::Internal("load cache lock poisoned".to_string()))
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Open a new session, dropping the least recently used ones past the cap.
    pub fn create(&self) -> ServerResult<Session> {
        let session = Session::new(self.tick());
        let mut sessions = self.sessions()?;

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .values()
                .min_by_key(|s| s.last_used)
                .map(|s| s.id.clone());
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                    log_info(format!("Session {} dropped (least recently used)", id));
                }
                None => break,
            }
        }

        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    pub fn remove(&self, id: &str) -> ServerResult<()> {
        self.sessions()?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ServerError::SessionNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.sessions().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self, id: &str) -> ServerResult<SessionState> {
        self.with_session(id, |s| s.state())
    }

    /// Parse `bytes` and store them as the session's `role` input.
    ///
    /// A failed parse leaves the previous upload in place.
    pub fn upload(
        &self,
        id: &str,
        role: Role,
        file_name: &str,
        bytes: &[u8],
    ) -> ServerResult<UploadSummary> {
        // unknown session fails before any parsing
        self.with_session(id, |_| ())?;

        let table_name = role.table_name();
        let key = cache_key(bytes, Some(file_name), table_name)?;
        let hit = self.cache()?.get(&key);

        let (parsed, cached) = match hit {
            Some(parsed) => {
                log_cache_hit(&parsed, table_name);
                (parsed, true)
            }
            None => {
                let parsed = Arc::new(read_upload(bytes, Some(file_name), table_name)?);
                (self.cache()?.insert(key, parsed), false)
            }
        };

        let upload = Upload {
            file_name: file_name.to_string(),
            parsed,
            cached,
        };
        let summary = upload.summary(role);

        let mut sessions = self.sessions()?;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| ServerError::SessionNotFound(id.to_string()))?;
        session.last_used = self.tick();
        *session.slot(role) = Some(upload);
        Ok(summary)
    }

    /// The uploaded POSDATA.
    pub fn posdata(&self, id: &str) -> ServerResult<Arc<ParseResult>> {
        self.with_session(id, |s| required(&s.posdata, POSDATA))?
    }

    /// Both uploaded inputs, POSDATA first.
    pub fn inputs(&self, id: &str) -> ServerResult<(Arc<ParseResult>, Arc<ParseResult>)> {
        self.with_session(id, |s| {
            Ok((required(&s.posdata, POSDATA)?, required(&s.pname, PNAME)?))
        })?
    }

    /// Run `f` on session `id`, marking it as used.
    fn with_session<T>(&self, id: &str, f: impl FnOnce(&Session) -> T) -> ServerResult<T> {
        let tick = self.tick();
        let mut sessions = self.sessions()?;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| ServerError::SessionNotFound(id.to_string()))?;
        session.last_used = tick;
        Ok(f(session))
    }
}

fn required(upload: &Option<Upload>, name: &'static str) -> ServerResult<Arc<ParseResult>> {
    upload
        .as_ref()
        .map(|u| Arc::clone(&u.parsed))
        .ok_or(ServerError::Pipeline(PipelineError::MissingUpload(name)))
}
