//! Product and project status propagation.
//!
//! Statuses are projections of task progress and only move forward. A
//! candidate that would lower the stored status is rejected and logged.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use crate::calculation::{
    ProductStanding, StatusDecision, decide_advance, derive_product_status,
    derive_project_status, highest_ranked,
};
use crate::error::{EngineError, EngineResult};
use crate::models::{StatusChange, WorkOrder};

use super::Engine;

impl Engine {
    /// Advances a product's status from the tasks that produce it.
    ///
    /// Returns the change applied, `None` when the status stays.
    pub async fn sync_product_status(
        &self,
        tenant: &str,
        product_id: &str,
    ) -> EngineResult<Option<StatusChange>> {
        let mut product = self
            .store
            .get_product(tenant, product_id)
            .await?
            .ok_or_else(|| EngineError::ProductNotFound {
                id: product_id.to_string(),
            })?;
        let tasks = self.store.tasks_for_product(tenant, product_id).await?;
        if tasks.is_empty() {
            debug!(tenant, product_id, "Product has no tasks; status untouched");
            return Ok(None);
        }

        let hierarchy = &self.config.product_statuses().hierarchy;
        let candidates: Vec<String> = tasks
            .iter()
            .map(|t| derive_product_status(t, &self.config))
            .collect();
        let Some(candidate) = highest_ranked(candidates.iter().map(String::as_str), hierarchy)
        else {
            warn!(tenant, product_id, ?candidates, "No derived product status is ranked");
            return Ok(None);
        };

        match decide_advance(&product.status, candidate, hierarchy) {
            StatusDecision::Advance { from, to } => {
                product.status = to.clone();
                self.store.save_product(product).await?;
                info!(tenant, product_id, %from, %to, "Advanced product status");
                Ok(Some(StatusChange {
                    subject: product_id.to_string(),
                    from,
                    to,
                }))
            }
            StatusDecision::Unchanged => Ok(None),
            StatusDecision::Regression { current, candidate } => {
                info!(
                    tenant,
                    product_id,
                    %current,
                    %candidate,
                    "Ignored product status regression"
                );
                Ok(None)
            }
            StatusDecision::Unknown { status } => {
                warn!(tenant, product_id, %status, "Product status not in hierarchy");
                Ok(None)
            }
        }
    }

    /// Advances a project's status from its products.
    pub async fn sync_project_status(
        &self,
        tenant: &str,
        project_id: &str,
    ) -> EngineResult<Option<StatusChange>> {
        let mut project = self
            .store
            .get_project(tenant, project_id)
            .await?
            .ok_or_else(|| EngineError::ProjectNotFound {
                id: project_id.to_string(),
            })?;
        let products = self.store.products_for_project(tenant, project_id).await?;

        let mut work_orders: HashMap<String, Option<WorkOrder>> = HashMap::new();
        let mut standings = Vec::with_capacity(products.len());
        for product in products {
            let mut installation_pending = false;
            for task in self.store.tasks_for_product(tenant, &product.id).await? {
                if !work_orders.contains_key(&task.work_order_id) {
                    let wo = self.store.get_work_order(tenant, &task.work_order_id).await?;
                    work_orders.insert(task.work_order_id.clone(), wo);
                }
                if let Some(Some(wo)) = work_orders.get(&task.work_order_id) {
                    if self.config.is_installation_kind(&wo.kind) && !wo.is_done() {
                        installation_pending = true;
                    }
                }
            }
            standings.push(ProductStanding {
                product_id: product.id,
                status: product.status,
                installation_pending,
            });
        }

        let Some(candidate) = derive_project_status(&project.status, &standings, &self.config)
        else {
            return Ok(None);
        };

        let hierarchy = &self.config.project_statuses().hierarchy;
        match decide_advance(&project.status, &candidate, hierarchy) {
            StatusDecision::Advance { from, to } => {
                project.status = to.clone();
                self.store.save_project(project).await?;
                info!(tenant, project_id, %from, %to, "Advanced project status");
                Ok(Some(StatusChange {
                    subject: project_id.to_string(),
                    from,
                    to,
                }))
            }
            StatusDecision::Unchanged => Ok(None),
            StatusDecision::Regression { current, candidate } => {
                info!(
                    tenant,
                    project_id,
                    %current,
                    %candidate,
                    "Ignored project status regression"
                );
                Ok(None)
            }
            StatusDecision::Unknown { status } => {
                warn!(tenant, project_id, %status, "Project status not in hierarchy");
                Ok(None)
            }
        }
    }

    /// Syncs products first, then their projects. Failures are logged.
    pub(crate) async fn propagate(
        &self,
        tenant: &str,
        products: &BTreeSet<String>,
        projects: &BTreeSet<String>,
    ) -> Vec<StatusChange> {
        let mut changes = Vec::new();
        for product_id in products {
            match self.sync_product_status(tenant, product_id).await {
                Ok(Some(change)) => changes.push(change),
                Ok(None) => {}
                Err(e) => warn!(tenant, product_id = %product_id, error = %e, "Product status sync failed"),
            }
        }
        for project_id in projects {
            match self.sync_project_status(tenant, project_id).await {
                Ok(Some(change)) => changes.push(change),
                Ok(None) => {}
                Err(e) => warn!(tenant, project_id = %project_id, error = %e, "Project status sync failed"),
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{Fixture, at, task, work_order};
    use crate::models::{Process, TaskStatus, WorkOrderStatus};
    use crate::store::DocumentStore;

    fn processes(stages: &[(&str, TaskStatus)]) -> crate::models::Decomposition {
        crate::models::Decomposition::Processes(
            stages
                .iter()
                .map(|(name, status)| Process {
                    name: name.to_string(),
                    status: *status,
                    worker_id: Some("w_a".to_string()),
                    helpers: vec![],
                    started_at: match status {
                        TaskStatus::Waiting => None,
                        _ => Some(at(4, 29, 8)),
                    },
                    completed_at: match status {
                        TaskStatus::Done => Some(at(4, 30, 16)),
                        _ => None,
                    },
                })
                .collect(),
        )
    }

    async fn finish(fx: &Fixture, id: &str) {
        let mut t = fx.task(id).await;
        t.status = TaskStatus::Done;
        t.completed_at = Some(at(5, 2, 16));
        fx.store_task(t).await;
    }

    #[tokio::test]
    async fn test_product_follows_active_stage() {
        let fx = Fixture::scenario().await;
        let mut t1 = fx.task("t_1").await;
        t1.decomposition = processes(&[
            ("Cutting", TaskStatus::Done),
            ("Drilling", TaskStatus::InProgress),
            ("Assembly", TaskStatus::Waiting),
        ]);
        fx.store_task(t1).await;

        let change = fx.engine.sync_product_status("acme", "p_1").await.unwrap();
        assert_eq!(
            change,
            Some(StatusChange {
                subject: "p_1".to_string(),
                from: "MaterialsReady".to_string(),
                to: "Drilling".to_string(),
            })
        );
        assert_eq!(fx.product("p_1").await.status, "Drilling");
    }

    #[tokio::test]
    async fn test_product_status_never_regresses() {
        let fx = Fixture::scenario().await;
        let mut product = fx.product("p_1").await;
        product.status = "Ready".to_string();
        fx.store.save_product(product).await.unwrap();

        let change = fx.engine.sync_product_status("acme", "p_1").await.unwrap();
        assert_eq!(change, None);
        assert_eq!(fx.product("p_1").await.status, "Ready");
    }

    #[tokio::test]
    async fn test_unknown_product_status_is_left_alone() {
        let fx = Fixture::scenario().await;
        let mut product = fx.product("p_1").await;
        product.status = "Lost".to_string();
        fx.store.save_product(product).await.unwrap();

        assert_eq!(fx.engine.sync_product_status("acme", "p_1").await.unwrap(), None);
        assert_eq!(fx.product("p_1").await.status, "Lost");
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let fx = Fixture::scenario().await;
        let result = fx.engine.sync_product_status("acme", "p_9").await;
        assert!(matches!(result, Err(EngineError::ProductNotFound { .. })));
    }

    #[tokio::test]
    async fn test_project_moves_into_production() {
        let fx = Fixture::scenario().await;
        fx.engine.sync_product_status("acme", "p_1").await.unwrap();

        let change = fx.engine.sync_project_status("acme", "prj_1").await.unwrap();
        assert_eq!(change.map(|c| c.to), Some("InProduction".to_string()));
    }

    #[tokio::test]
    async fn test_unapproved_project_does_not_start_production() {
        let fx = Fixture::scenario().await;
        let mut project = fx.project("prj_1").await;
        project.status = "Offered".to_string();
        fx.store.save_project(project).await.unwrap();
        fx.engine.sync_product_status("acme", "p_1").await.unwrap();

        assert_eq!(fx.engine.sync_project_status("acme", "prj_1").await.unwrap(), None);
        assert_eq!(fx.project("prj_1").await.status, "Offered");
    }

    #[tokio::test]
    async fn test_project_completes_when_all_products_ready() {
        let fx = Fixture::scenario().await;
        for id in ["t_1", "t_2", "t_3"] {
            finish(&fx, id).await;
        }
        for product in ["p_1", "p_2", "p_3"] {
            fx.engine.sync_product_status("acme", product).await.unwrap();
        }

        let change = fx.engine.sync_project_status("acme", "prj_1").await.unwrap();
        assert_eq!(change.map(|c| c.to), Some("Complete".to_string()));
    }

    #[tokio::test]
    async fn test_open_installation_holds_project_completion() {
        let fx = Fixture::scenario().await;
        for id in ["t_1", "t_2", "t_3"] {
            finish(&fx, id).await;
        }
        fx.store_work_order(work_order("wo_inst", "installation", at(5, 3, 7)))
            .await;
        fx.store_task(task("t_9", "wo_inst", "p_3", &["w_z"])).await;
        for product in ["p_1", "p_2", "p_3"] {
            fx.engine.sync_product_status("acme", product).await.unwrap();
        }

        let change = fx.engine.sync_project_status("acme", "prj_1").await.unwrap();
        assert_eq!(change.map(|c| c.to), Some("InProduction".to_string()));

        // Once installed the carve-out is satisfied.
        let mut t9 = fx.task("t_9").await;
        t9.status = TaskStatus::Done;
        t9.completed_at = Some(at(5, 4, 12));
        t9.decomposition = processes(&[("Installation", TaskStatus::Done)]);
        fx.store_task(t9).await;
        let mut wo = fx.work_order("wo_inst").await;
        wo.status = WorkOrderStatus::Done;
        fx.store_work_order(wo).await;
        fx.engine.sync_product_status("acme", "p_3").await.unwrap();
        assert_eq!(fx.product("p_3").await.status, "Installed");

        let change = fx.engine.sync_project_status("acme", "prj_1").await.unwrap();
        assert_eq!(change.map(|c| c.to), Some("Complete".to_string()));
    }

    #[tokio::test]
    async fn test_propagate_collects_changes_and_skips_failures() {
        let fx = Fixture::scenario().await;
        let products: BTreeSet<String> = ["p_1".to_string(), "p_missing".to_string()].into();
        let projects: BTreeSet<String> = ["prj_1".to_string()].into();

        let changes = fx.engine.propagate("acme", &products, &projects).await;
        let subjects: Vec<&str> = changes.iter().map(|c| c.subject.as_str()).collect();
        assert_eq!(subjects, vec!["p_1", "prj_1"]);
    }
}
