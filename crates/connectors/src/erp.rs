use crate::error::ConnectorError;
use async_trait::async_trait;
use model::erp::{DeliveryOrder, DeliveryStatistics, ExpectedMaterial, PieceRecipe, TransformationPost};
use serde::Deserialize;
use std::time::Duration;

/// Poll expected shipments/orders/deliveries; post date advance, warehouse
/// entry/exit, transformation completion, shipment arrival, delivery
/// confirmation and statistics. Wire encoding (x-www-form-urlencoded posts,
/// JSON gets) is entirely the concrete implementation's concern — the core
/// only ever sees this trait.
#[async_trait]
pub trait ErpClient: Send + Sync {
    async fn current_day(&self) -> Result<u32, ConnectorError>;
    async fn advance_day(&self, day: u32) -> Result<(), ConnectorError>;
    async fn expected_materials(&self, day: u32) -> Result<Vec<ExpectedMaterial>, ConnectorError>;
    async fn post_shipment_arrival(&self, shipment_id: &str) -> Result<(), ConnectorError>;
    async fn pending_production(&self, max_items: u32) -> Result<Vec<PieceRecipe>, ConnectorError>;
    async fn post_transformation(&self, post: TransformationPost) -> Result<(), ConnectorError>;
    async fn post_warehouse_exit(&self, item_id: &str) -> Result<(), ConnectorError>;
    async fn post_warehouse_entry(&self, item_id: &str) -> Result<(), ConnectorError>;
    async fn pending_deliveries(&self) -> Result<Vec<DeliveryOrder>, ConnectorError>;
    async fn post_delivery_confirmation(&self, id: &str) -> Result<(), ConnectorError>;
    async fn post_delivery_statistics(&self, stats: DeliveryStatistics) -> Result<(), ConnectorError>;
}

/// Reference `ErpClient` backed by `reqwest`, matching the endpoint table
/// in the external interfaces section.
pub struct HttpErpClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpErpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client builder never fails with these options"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_form(&self, endpoint: &'static str, form: &[(&str, &str)]) -> Result<(), ConnectorError> {
        let resp = self
            .client
            .post(self.url(endpoint))
            .form(form)
            .send()
            .await?;
        let status = resp.status();
        if status.as_u16() != 201 {
            return Err(ConnectorError::ErpStatus {
                status: status.as_u16(),
                endpoint,
            });
        }
        Ok(())
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &'static str,
        query: &[(&str, String)],
    ) -> Result<T, ConnectorError> {
        let resp = self
            .client
            .get(self.url(endpoint))
            .query(query)
            .send()
            .await?;
        let status = resp.status();
        if status.as_u16() != 200 {
            return Err(ConnectorError::ErpStatus {
                status: status.as_u16(),
                endpoint,
            });
        }
        Ok(resp.json::<T>().await?)
    }
}

#[derive(Deserialize)]
struct DateResponse {
    day: u32,
}

#[async_trait]
impl ErpClient for HttpErpClient {
    async fn current_day(&self) -> Result<u32, ConnectorError> {
        let resp: DateResponse = self.get_json("/date", &[]).await?;
        Ok(resp.day)
    }

    async fn advance_day(&self, day: u32) -> Result<(), ConnectorError> {
        self.post_form("/date", &[("day", &day.to_string())]).await
    }

    async fn expected_materials(&self, day: u32) -> Result<Vec<ExpectedMaterial>, ConnectorError> {
        self.get_json("/materials/expected", &[("day", day.to_string())])
            .await
    }

    async fn post_shipment_arrival(&self, shipment_id: &str) -> Result<(), ConnectorError> {
        self.post_form("/materials/arrivals", &[("shipment_id", shipment_id)])
            .await
    }

    async fn pending_production(&self, max_items: u32) -> Result<Vec<PieceRecipe>, ConnectorError> {
        self.get_json(
            "/production",
            &[("max_n_items", max_items.to_string())],
        )
        .await
    }

    async fn post_transformation(&self, post: TransformationPost) -> Result<(), ConnectorError> {
        self.post_form(
            "/transformations",
            &[
                ("transf_id", post.transf_id.as_str()),
                ("material_id", post.material_id.as_str()),
                ("product_id", post.product_id.as_str()),
                ("line_id", post.line_id.as_str()),
                ("machine_id", post.machine_id.as_str()),
                ("time_taken", &post.time_taken.to_string()),
            ],
        )
        .await
    }

    async fn post_warehouse_exit(&self, item_id: &str) -> Result<(), ConnectorError> {
        self.post_form("/warehouse", &[("item_id", item_id), ("exit", "true")])
            .await
    }

    async fn post_warehouse_entry(&self, item_id: &str) -> Result<(), ConnectorError> {
        self.post_form("/warehouse", &[("item_id", item_id), ("entry", "true")])
            .await
    }

    async fn pending_deliveries(&self) -> Result<Vec<DeliveryOrder>, ConnectorError> {
        self.get_json("/deliveries", &[]).await
    }

    async fn post_delivery_confirmation(&self, id: &str) -> Result<(), ConnectorError> {
        self.post_form("/deliveries", &[("id", id)]).await
    }

    async fn post_delivery_statistics(&self, stats: DeliveryStatistics) -> Result<(), ConnectorError> {
        self.post_form(
            "/deliveries/statistics",
            &[
                ("line", stats.line.as_str()),
                ("piece", stats.piece.as_str()),
                ("associated_order_id", stats.associated_order_id.as_str()),
                ("quantity", &stats.quantity.to_string()),
            ],
        )
        .await
    }
}
