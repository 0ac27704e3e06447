use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use domain::access::{authorize, Operation};
use domain::prescriptions::{inputs::CreatePrescriptionInput, Workflow};

use crate::error::ApiError;
use crate::principal::CurrentPrincipal;

#[derive(Clone)]
pub struct AppState {
    pub workflow: Workflow,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/prescriptions", post(create_prescription))
        .route("/prescriptions/doctor", get(list_doctor_prescriptions))
        .route("/prescriptions/patient", get(list_patient_prescriptions))
        .route("/prescriptions/pending", get(list_pending_prescriptions))
        .route("/prescriptions/:id", get(get_prescription))
        .route("/prescriptions/:id/dispense", put(dispense_prescription))
        .route("/prescriptions/:id/complete", put(complete_prescription))
        .with_state(state)
}

// Create prescription
async fn create_prescription(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    body: Result<Json<CreatePrescriptionInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&principal, Operation::CreatePrescription)?;
    let Json(input) = body?;
    let prescription = state.workflow.create(&principal, input).await?;

    Ok((StatusCode::CREATED, Json(prescription)))
}

// Get prescription with references resolved
async fn get_prescription(
    Path(id): Path<String>,
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.workflow.get(&principal, &id).await?;

    Ok(Json(view))
}

// Dispense prescription
async fn dispense_prescription(
    Path(id): Path<String>,
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<impl IntoResponse, ApiError> {
    let prescription = state.workflow.dispense(&principal, &id).await?;

    Ok(Json(prescription))
}

// Confirm receipt
async fn complete_prescription(
    Path(id): Path<String>,
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<impl IntoResponse, ApiError> {
    let prescription = state.workflow.complete(&principal, &id).await?;

    Ok(Json(prescription))
}

async fn list_doctor_prescriptions(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.workflow.list_for_doctor(&principal).await?))
}

async fn list_patient_prescriptions(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.workflow.list_for_patient(&principal).await?))
}

async fn list_pending_prescriptions(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.workflow.list_pending(&principal).await?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Utc;
    use domain::medicines::Medicine;
    use domain::store::MemoryStore;
    use domain::users::{Role, User};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::principal::USER_ID_HEADER;

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            name: format!("User {id}"),
            email: format!("{id}@example.com"),
            role,
        }
    }

    fn medicine(id: &str, stock: u32) -> Medicine {
        let now = Utc::now();
        Medicine {
            id: id.to_string(),
            name: format!("Medicine {id}"),
            description: "test".to_string(),
            dosage_form: "tablet".to_string(),
            strength: "10mg".to_string(),
            manufacturer: "Acme".to_string(),
            stock_quantity: stock,
            created_at: now,
            updated_at: now,
        }
    }

    async fn test_app() -> (Router, Workflow) {
        let store = MemoryStore::seeded(
            vec![
                user("doc-1", Role::Doctor),
                user("pat-1", Role::Patient),
                user("pat-2", Role::Patient),
                user("ph-1", Role::Pharmacist),
            ],
            vec![medicine("m1", 5), medicine("m2", 0)],
        )
        .await;
        let workflow = Workflow::new(Arc::new(store));
        let app = router(AppState {
            workflow: workflow.clone(),
        });
        (app, workflow)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        user_id: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = user_id {
            builder = builder.header(USER_ID_HEADER, id);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn prescription_body(medicines: &[&str]) -> Value {
        json!({
            "patient": "pat-1",
            "medicines": medicines.iter().map(|m| json!({
                "medicine": m,
                "dosage": "1 tablet",
                "frequency": "daily",
                "duration": "10 days"
            })).collect::<Vec<_>>(),
            "notes": "with food"
        })
    }

    async fn create(app: &Router, medicines: &[&str]) -> String {
        let (status, json) = send(
            app,
            "POST",
            "/prescriptions",
            Some("doc-1"),
            Some(prescription_body(medicines)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        json["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn create_returns_201_with_record() {
        let (app, _) = test_app().await;
        let (status, json) = send(
            &app,
            "POST",
            "/prescriptions",
            Some("doc-1"),
            Some(prescription_body(&["m1"])),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["status"], "created");
        assert_eq!(json["doctor"], "doc-1");
        assert_eq!(json["patient"], "pat-1");
        assert_eq!(json["notes"], "with food");
        assert_eq!(json["medicines"][0]["duration"], "10 days");
    }

    #[tokio::test]
    async fn missing_or_unknown_user_is_401() {
        let (app, _) = test_app().await;
        let body = Some(prescription_body(&["m1"]));

        let (status, json) = send(&app, "POST", "/prescriptions", None, body.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");

        let (status, _) = send(&app, "POST", "/prescriptions", Some("ghost"), body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_by_pharmacist_is_403() {
        let (app, _) = test_app().await;
        let (status, _) = send(
            &app,
            "POST",
            "/prescriptions",
            Some("ph-1"),
            Some(prescription_body(&["m1"])),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json) = send(
            &app,
            "POST",
            "/prescriptions",
            Some("ph-1"),
            Some(json!({ "medicines": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn create_with_bad_input_is_400_or_404() {
        let (app, _) = test_app().await;

        let (status, json) = send(
            &app,
            "POST",
            "/prescriptions",
            Some("doc-1"),
            Some(prescription_body(&[])),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION");

        let (status, json) = send(
            &app,
            "POST",
            "/prescriptions",
            Some("doc-1"),
            Some(json!({ "medicines": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION");

        let (status, json) = send(
            &app,
            "POST",
            "/prescriptions",
            Some("doc-1"),
            Some(prescription_body(&["unknown"])),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["message"], "Medicine not found");
    }

    #[tokio::test]
    async fn full_lifecycle_over_http() {
        let (app, workflow) = test_app().await;
        let id = create(&app, &["m1", "m2"]).await;

        let (status, json) = send(
            &app,
            "PUT",
            &format!("/prescriptions/{id}/dispense"),
            Some("ph-1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "dispensed");

        let store = workflow.store();
        assert_eq!(
            store.get_medicine("m1").await.unwrap().unwrap().stock_quantity,
            4
        );
        assert_eq!(
            store.get_medicine("m2").await.unwrap().unwrap().stock_quantity,
            0
        );

        let (status, json) = send(
            &app,
            "PUT",
            &format!("/prescriptions/{id}/dispense"),
            Some("ph-1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "INVALID_STATE");

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/prescriptions/{id}/complete"),
            Some("pat-2"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json) = send(
            &app,
            "PUT",
            &format!("/prescriptions/{id}/complete"),
            Some("pat-1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "completed");
    }

    #[tokio::test]
    async fn complete_before_dispense_is_400() {
        let (app, _) = test_app().await;
        let id = create(&app, &["m1"]).await;

        let (status, json) = send(
            &app,
            "PUT",
            &format!("/prescriptions/{id}/complete"),
            Some("pat-1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "INVALID_STATE");
    }

    #[tokio::test]
    async fn dispense_missing_prescription_is_404() {
        let (app, _) = test_app().await;
        let (status, json) = send(
            &app,
            "PUT",
            "/prescriptions/missing/dispense",
            Some("ph-1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["message"], "Prescription not found");
    }

    #[tokio::test]
    async fn get_resolves_references_for_participants_only() {
        let (app, _) = test_app().await;
        let id = create(&app, &["m1"]).await;
        let uri = format!("/prescriptions/{id}");

        let (status, json) = send(&app, "GET", &uri, Some("pat-1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["patient"]["name"], "User pat-1");
        assert_eq!(json["doctor"]["email"], "doc-1@example.com");
        assert_eq!(json["medicines"][0]["medicine"]["dosageForm"], "tablet");

        let (status, _) = send(&app, "GET", &uri, Some("ph-1"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "GET", &uri, Some("pat-2"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn role_scoped_lists() {
        let (app, _) = test_app().await;
        let id = create(&app, &["m1"]).await;

        let (status, json) = send(&app, "GET", "/prescriptions/pending", Some("ph-1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["id"], id.as_str());

        let (status, json) = send(&app, "GET", "/prescriptions/patient", Some("pat-2"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!([]));

        let (status, json) = send(&app, "GET", "/prescriptions/doctor", Some("doc-1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "GET", "/prescriptions/pending", Some("pat-1"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
