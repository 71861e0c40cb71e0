//! 内存存储实现
//!
//! 用于测试与单机运行；生产部署把这两个 trait 接到真实数据库上即可。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::audit::Audit;
use crate::models::glossary::Glossary;
use crate::store::{AuditStore, GlossaryStore, StoreError};

/// 内存审计存储
#[derive(Default)]
pub struct MemoryAuditStore {
    audits: RwLock<HashMap<Uuid, Audit>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn insert(&self, audit: Audit) -> Result<(), StoreError> {
        let mut audits = self.audits.write().await;
        if audits.contains_key(&audit.id) {
            return Err(StoreError::AlreadyExists(audit.id));
        }
        audits.insert(audit.id, audit);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Audit, StoreError> {
        let audits = self.audits.read().await;
        audits.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn persist(&self, audit: &Audit) -> Result<(), StoreError> {
        let mut audits = self.audits.write().await;
        // 记录已被删除时拒绝写入，这是流水线的协作取消点
        match audits.get_mut(&audit.id) {
            Some(slot) => {
                *slot = audit.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(audit.id)),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut audits = self.audits.write().await;
        audits.remove(&id).map(|_| ()).ok_or(StoreError::NotFound(id))
    }

    async fn list(
        &self,
        owner_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Audit>, usize), StoreError> {
        let audits = self.audits.read().await;
        let mut owned: Vec<Audit> = audits
            .values()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = owned.len();
        let page = owned.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }
}

/// 内存术语表存储
#[derive(Default)]
pub struct MemoryGlossaryStore {
    glossaries: RwLock<HashMap<Uuid, Glossary>>,
}

impl MemoryGlossaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GlossaryStore for MemoryGlossaryStore {
    async fn insert(&self, glossary: Glossary) -> Result<(), StoreError> {
        let mut glossaries = self.glossaries.write().await;
        glossaries.insert(glossary.id, glossary);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Glossary, StoreError> {
        let glossaries = self.glossaries.read().await;
        glossaries
            .get(&id)
            .cloned()
            .ok_or(StoreError::GlossaryNotFound(id))
    }

    async fn find_system(
        &self,
        industry: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<Option<Glossary>, StoreError> {
        let glossaries = self.glossaries.read().await;
        // 同一行业 + 语言对可能被重复播种，取名称最小者保证解析结果确定
        let mut matches: Vec<&Glossary> = glossaries
            .values()
            .filter(|g| {
                g.is_system
                    && g.industry.eq_ignore_ascii_case(industry)
                    && g.matches_pair(source_language, target_language)
            })
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matches.first().map(|g| (*g).clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audit::{AcquisitionMode, AuditKind, AuditRequest};

    fn request(owner: &str) -> AuditRequest {
        AuditRequest {
            owner_id: owner.to_string(),
            kind: AuditKind::Comparison,
            source_url: Some("https://example.com/en".to_string()),
            target_url: Some("https://example.com/ko".to_string()),
            images: Vec::new(),
            source_language: Some("en".to_string()),
            target_language: Some("ko".to_string()),
            industry: None,
            glossary_id: None,
            acquisition: AcquisitionMode::Text,
        }
    }

    #[tokio::test]
    async fn test_insert_get_delete() {
        let store = MemoryAuditStore::new();
        let audit = Audit::from_request(&request("u1"));
        let id = audit.id;

        store.insert(audit).await.unwrap();
        assert_eq!(store.get(id).await.unwrap().id, id);

        store.delete(id).await.unwrap();
        assert!(matches!(store.get(id).await, Err(StoreError::NotFound(_))));
        // 重复删除同样报 NotFound
        assert!(matches!(store.delete(id).await, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_persist_after_delete_is_rejected() {
        tokio_test::block_on(async {
            let store = MemoryAuditStore::new();
            let audit = Audit::from_request(&request("u1"));
            let id = audit.id;
            store.insert(audit.clone()).await.unwrap();
            store.delete(id).await.unwrap();

            assert!(matches!(
                store.persist(&audit).await,
                Err(StoreError::NotFound(_))
            ));
        });
    }

    #[tokio::test]
    async fn test_list_is_owner_scoped() {
        let store = MemoryAuditStore::new();
        store.insert(Audit::from_request(&request("u1"))).await.unwrap();
        store.insert(Audit::from_request(&request("u1"))).await.unwrap();
        store.insert(Audit::from_request(&request("u2"))).await.unwrap();

        let (page, total) = store.list("u1", 0, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 2);

        let (page, total) = store.list("u1", 1, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
    }
}
