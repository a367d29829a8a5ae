//! # 会话子系统
//!
//! ## 定位（Why）
//! - 描述符只记录控制器声明的会话策略；真正为请求提供会话的是这里的 [`SessionFactory`]；
//! - 无状态工厂让所有请求共享同一个只读会话，既不分配内存也不产生 `Set-Cookie`；
//! - 策略以 [`SessionStrategy`] 值的形式注入应用，不存在任何全局可变状态。
//!
//! ## 组件（What）
//! - [`Session`] / [`SessionContext`]：会话与会话内键值存储的最小契约；
//! - [`StatelessSessionFactory`]：共享会话，`is_recent()` 恒为 `false`，写入被忽略；
//! - [`MemorySessionFactory`]：基于 `DashMap` 的进程内有状态实现，适合单实例部署与测试；
//! - [`SessionStrategy`]：按控制器声明与全局配置选择工厂。

use core::fmt;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use dashmap::DashMap;
use spark_controller::SessionPolicy;
use thiserror::Error;

use crate::config::SessionConfig;

/// 会话内的键值存储。
pub trait SessionContext: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<String>;

    /// 写入并返回旧值。
    fn put(&self, key: &str, value: String) -> Option<String>;

    fn remove(&self, key: &str) -> Option<String>;
}

/// 单个客户端会话。
pub trait Session: Send + Sync + fmt::Debug {
    /// 会话标识；共享的无状态会话没有标识。
    fn id(&self) -> Option<&str>;

    /// 会话是否在本次请求中新建。响应层据此决定是否下发会话 Cookie。
    fn is_recent(&self) -> bool;

    fn creation_time(&self) -> SystemTime;

    fn access_time(&self) -> SystemTime;

    fn context(&self) -> &dyn SessionContext;
}

/// 工厂查找会话时可见的请求信息。
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionRequest<'a> {
    /// 客户端携带的会话标识（通常来自 Cookie）。
    pub session_id: Option<&'a str>,
}

impl<'a> SessionRequest<'a> {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_id(session_id: &'a str) -> Self {
        Self {
            session_id: Some(session_id),
        }
    }
}

/// 会话工厂。
///
/// # 教案式说明
/// - **意图 (Why)**：把会话的创建、查找与回收集中在一个可替换的实现中；
/// - **契约 (What)**：
///   - `start`：应用装载完成后调用一次，可读取会话配置；
///   - `find`：为请求返回会话，必要时新建；
///   - `invalidate`：立即作废指定标识的会话（如用户登出），返回是否存在；
///   - `stop`：应用关闭时调用，释放全部会话；
///   - `name`：用于日志的简短名称。
pub trait SessionFactory: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn start(&self, config: &SessionConfig) -> Result<(), SessionError> {
        let _ = config;
        Ok(())
    }

    fn find(&self, request: &SessionRequest<'_>) -> Arc<dyn Session>;

    fn invalidate(&self, id: &str) -> bool {
        let _ = id;
        false
    }

    fn stop(&self) {}
}

/// 会话子系统错误。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// 配置要求有状态会话，但宿主没有提供有状态工厂。
    #[error("session policy `stateful` requires a stateful session factory")]
    MissingStatefulFactory,
    /// 工厂启动失败。
    #[error("session factory `{factory}` failed to start: {reason}")]
    StartFailed { factory: String, reason: String },
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

fn from_millis(millis: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(millis)
}

/// 忽略全部写入的会话上下文。
#[derive(Debug, Default)]
pub struct DiscardingContext;

impl SessionContext for DiscardingContext {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn put(&self, _key: &str, _value: String) -> Option<String> {
        None
    }

    fn remove(&self, _key: &str) -> Option<String> {
        None
    }
}

/// 所有请求共享的无状态会话。
#[derive(Debug)]
pub struct StatelessSession {
    created: u64,
    accessed: AtomicU64,
    context: DiscardingContext,
}

impl StatelessSession {
    fn new() -> Self {
        let now = now_millis();
        Self {
            created: now,
            accessed: AtomicU64::new(now),
            context: DiscardingContext,
        }
    }

    fn touch(&self) {
        self.accessed.store(now_millis(), Ordering::Relaxed);
    }
}

impl Session for StatelessSession {
    fn id(&self) -> Option<&str> {
        None
    }

    fn is_recent(&self) -> bool {
        false
    }

    fn creation_time(&self) -> SystemTime {
        from_millis(self.created)
    }

    fn access_time(&self) -> SystemTime {
        from_millis(self.accessed.load(Ordering::Relaxed))
    }

    fn context(&self) -> &dyn SessionContext {
        &self.context
    }
}

/// 无状态会话工厂。
///
/// - **契约 (What)**：每次 `find` 返回同一个 `Arc`，只刷新访问时间；`start`/`stop` 不做任何事；
/// - **风险 (Trade-offs)**：控制器若依赖会话写入，在该工厂下会静默丢失数据。
#[derive(Debug)]
pub struct StatelessSessionFactory {
    session: Arc<StatelessSession>,
}

impl Default for StatelessSessionFactory {
    fn default() -> Self {
        Self {
            session: Arc::new(StatelessSession::new()),
        }
    }
}

impl StatelessSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionFactory for StatelessSessionFactory {
    fn name(&self) -> &str {
        "disabled"
    }

    fn find(&self, _request: &SessionRequest<'_>) -> Arc<dyn Session> {
        self.session.touch();
        self.session.clone()
    }
}

/// 进程内会话的键值存储。
#[derive(Debug, Default)]
pub struct MemoryContext {
    values: DashMap<String, String>,
}

impl SessionContext for MemoryContext {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|value| value.value().clone())
    }

    fn put(&self, key: &str, value: String) -> Option<String> {
        self.values.insert(key.to_owned(), value)
    }

    fn remove(&self, key: &str) -> Option<String> {
        self.values.remove(key).map(|(_, value)| value)
    }
}

/// 进程内有状态会话。
#[derive(Debug)]
pub struct MemorySession {
    id: String,
    recent: bool,
    created: u64,
    accessed: AtomicU64,
    context: Arc<MemoryContext>,
}

impl Session for MemorySession {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn is_recent(&self) -> bool {
        self.recent
    }

    fn creation_time(&self) -> SystemTime {
        from_millis(self.created)
    }

    fn access_time(&self) -> SystemTime {
        from_millis(self.accessed.load(Ordering::Relaxed))
    }

    fn context(&self) -> &dyn SessionContext {
        self.context.as_ref()
    }
}

#[derive(Debug)]
struct MemoryEntry {
    created: u64,
    accessed: AtomicU64,
    context: Arc<MemoryContext>,
}

/// 基于 `DashMap` 的进程内会话工厂。
///
/// # 教案式说明
/// - **意图 (Why)**：为单实例部署与测试提供开箱即用的有状态会话；
/// - **契约 (What)**：
///   - 请求携带已知标识时返回既有会话，`is_recent()` 为 `false`；
///   - 未携带或标识未知时新建会话，`is_recent()` 为 `true`；
///   - `stop` 清空全部会话；
///   - 配置了空闲超时后，超时的会话视为未知标识；每次新建会话前顺带清扫全部超时会话；
///   - `invalidate` 与 `stop` 分别释放单个与全部会话；
/// - **风险 (Trade-offs)**：标识由单调计数器生成，不具备不可预测性，不应暴露在不可信网络中；
///   未配置空闲超时时，会话只能通过 `invalidate`/`stop` 释放。
#[derive(Debug, Default)]
pub struct MemorySessionFactory {
    sessions: DashMap<String, MemoryEntry>,
    next_id: AtomicU64,
    /// 毫秒；0 表示不淘汰。
    idle_timeout_ms: AtomicU64,
}

impl MemorySessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前存活的会话数量。
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// 设置空闲超时。`start` 读到配置中的超时会覆盖此值。
    pub fn with_idle_timeout(self, timeout: Duration) -> Self {
        self.set_idle_timeout(timeout);
        self
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.idle_timeout_ms.load(Ordering::Relaxed) {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        }
    }

    fn set_idle_timeout(&self, timeout: Duration) {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1);
        self.idle_timeout_ms.store(millis, Ordering::Relaxed);
    }

    fn is_idle(&self, entry: &MemoryEntry, now: u64) -> bool {
        let timeout = self.idle_timeout_ms.load(Ordering::Relaxed);
        timeout != 0 && now.saturating_sub(entry.accessed.load(Ordering::Relaxed)) > timeout
    }

    /// 清扫空闲超时的会话，返回清除数量。
    pub fn purge_idle(&self) -> usize {
        if self.idle_timeout_ms.load(Ordering::Relaxed) == 0 {
            return 0;
        }
        let now = now_millis();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| !self.is_idle(entry, now));
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            tracing::debug!(sessions = purged, "idle sessions purged");
        }
        purged
    }

    fn view(id: &str, entry: &MemoryEntry, recent: bool) -> Arc<dyn Session> {
        Arc::new(MemorySession {
            id: id.to_owned(),
            recent,
            created: entry.created,
            accessed: AtomicU64::new(entry.accessed.load(Ordering::Relaxed)),
            context: Arc::clone(&entry.context),
        })
    }
}

impl SessionFactory for MemorySessionFactory {
    fn name(&self) -> &str {
        "memory"
    }

    fn start(&self, config: &SessionConfig) -> Result<(), SessionError> {
        match config.idle_timeout_secs {
            Some(0) => Err(SessionError::StartFailed {
                factory: self.name().to_owned(),
                reason: "idle_timeout_secs must be greater than zero".to_owned(),
            }),
            Some(secs) => {
                self.set_idle_timeout(Duration::from_secs(secs));
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn find(&self, request: &SessionRequest<'_>) -> Arc<dyn Session> {
        let now = now_millis();
        if let Some(id) = request.session_id
            && let Some(entry) = self.sessions.get(id)
            && !self.is_idle(&entry, now)
        {
            entry.accessed.store(now, Ordering::Relaxed);
            return Self::view(id, &entry, false);
        }

        self.purge_idle();

        let id = format!("{:016x}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let entry = MemoryEntry {
            created: now,
            accessed: AtomicU64::new(now),
            context: Arc::default(),
        };
        let session = Self::view(&id, &entry, true);
        tracing::trace!(session = %id, "session created");
        self.sessions.insert(id, entry);
        session
    }

    fn invalidate(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    fn stop(&self) {
        let count = self.sessions.len();
        self.sessions.clear();
        tracing::debug!(sessions = count, "memory sessions released");
    }
}

/// 会话策略：按控制器声明选择工厂。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - 声明 `None` 的控制器永远没有会话；
///   - 声明 `Stateless` 的控制器永远使用共享的无状态会话；
///   - 声明 `Stateful` 的控制器使用配置选定的策略：配置为 `stateful` 时使用宿主提供的有状态工厂，
///     配置为 `stateless` 时退化为无状态会话，配置为 `none` 时没有会话；
/// - **前置条件**：配置为 `stateful` 时必须提供有状态工厂，否则
///   [`from_config`](Self::from_config) 返回 [`SessionError::MissingStatefulFactory`]。
#[derive(Clone, Debug)]
pub struct SessionStrategy {
    configured: SessionPolicy,
    stateless: Arc<StatelessSessionFactory>,
    stateful: Option<Arc<dyn SessionFactory>>,
}

impl SessionStrategy {
    pub fn from_config(
        config: &SessionConfig,
        stateful: Option<Arc<dyn SessionFactory>>,
    ) -> Result<Self, SessionError> {
        if config.policy == SessionPolicy::Stateful && stateful.is_none() {
            return Err(SessionError::MissingStatefulFactory);
        }
        Ok(Self {
            configured: config.policy,
            stateless: Arc::new(StatelessSessionFactory::new()),
            stateful,
        })
    }

    /// 全部请求都使用无状态会话的策略。
    pub fn stateless() -> Self {
        Self {
            configured: SessionPolicy::Stateless,
            stateless: Arc::new(StatelessSessionFactory::new()),
            stateful: None,
        }
    }

    pub fn configured_policy(&self) -> SessionPolicy {
        self.configured
    }

    /// 按控制器声明的策略选出工厂；`None` 表示该控制器不使用会话。
    pub fn factory_for(&self, declared: SessionPolicy) -> Option<Arc<dyn SessionFactory>> {
        let effective = match declared {
            SessionPolicy::Stateful => self.configured,
            other => other,
        };
        match effective {
            SessionPolicy::None => None,
            SessionPolicy::Stateless => Some(self.stateless.clone() as Arc<dyn SessionFactory>),
            SessionPolicy::Stateful => self.stateful.clone(),
        }
    }

    /// 启动全部会话工厂。
    pub fn start(&self, config: &SessionConfig) -> Result<(), SessionError> {
        self.stateless.start(config)?;
        if let Some(stateful) = &self.stateful {
            stateful.start(config)?;
            tracing::debug!(factory = stateful.name(), "stateful session factory started");
        }
        Ok(())
    }

    /// 停止全部会话工厂。
    pub fn stop(&self) {
        self.stateless.stop();
        if let Some(stateful) = &self.stateful {
            stateful.stop();
        }
    }
}
