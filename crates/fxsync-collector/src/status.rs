//! 상품별 동기화 상태 보드.
//!
//! 실행 중인 프로세스 메모리에만 존재하며 재시작하면 비어 있는 상태로 시작합니다.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use fxsync_core::{ChunkProgress, Instrument, SyncState, SyncStatus};

/// 상품별 `SyncState` 저장소
#[derive(Debug, Default)]
pub struct SyncStatusBoard {
    states: RwLock<HashMap<Instrument, SyncState>>,
}

impl SyncStatusBoard {
    /// 빈 보드 생성
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Instrument, SyncState>> {
        self.states.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Instrument, SyncState>> {
        self.states.write().unwrap_or_else(|e| e.into_inner())
    }

    fn modify(&self, instrument: &Instrument, f: impl FnOnce(&mut SyncState)) {
        let mut states = self.write();
        let state = states.entry(instrument.clone()).or_default();
        f(state);
        state.updated_at = Utc::now();
    }

    /// 상태와 메시지 갱신
    pub fn update(&self, instrument: &Instrument, status: SyncStatus, message: impl Into<String>) {
        let message = message.into();
        self.modify(instrument, |state| {
            state.status = status;
            state.message = message;
        });
    }

    /// 진행률 초기화
    pub fn set_progress(&self, instrument: &Instrument, completed: usize, total: usize) {
        self.modify(instrument, |state| {
            state.progress = ChunkProgress { completed, total };
        });
    }

    /// 완료 청크 하나 증가
    pub fn advance(&self, instrument: &Instrument) {
        self.modify(instrument, |state| {
            state.progress.completed = (state.progress.completed + 1).min(state.progress.total);
        });
    }

    /// 마지막 커밋 시각 기록
    pub fn set_last_timestamp(&self, instrument: &Instrument, ts: DateTime<Utc>) {
        self.modify(instrument, |state| state.last_timestamp = Some(ts));
    }

    /// 상품 하나의 상태
    pub fn get(&self, instrument: &Instrument) -> Option<SyncState> {
        self.read().get(instrument).cloned()
    }

    /// 전체 상태 (상품 코드 순)
    pub fn snapshot(&self) -> Vec<(Instrument, SyncState)> {
        let mut all: Vec<_> = self
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}
