use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::models::{
    AppointmentDetails, CancelledBy, DeliveryMethod, EnqueueNotification, NotificationStatus,
    NotificationType,
};
use notification_cell::services::notify::NotificationService;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockTableRows, TestConfig};

fn notify_service(mock_server: &MockServer) -> NotificationService {
    let config = TestConfig {
        supabase_url: mock_server.uri(),
        ..Default::default()
    }
    .to_app_config();

    NotificationService::with_client(Arc::new(SupabaseClient::new(&config)))
}

fn details(patient_id: Uuid, doctor_id: Uuid) -> AppointmentDetails {
    AppointmentDetails {
        appointment_id: Uuid::new_v4(),
        patient_id,
        doctor_id,
        appointment_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        appointment_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        appointment_type: Some("Therapy Session".to_string()),
    }
}

#[tokio::test]
async fn test_enqueue_creates_pending_row() {
    let mock_server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .and(body_partial_json(json!({
            "user_id": user_id,
            "notification_type": "general",
            "status": "pending",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockTableRows::notification(
                &Uuid::new_v4().to_string(),
                &user_id.to_string(),
                "general",
                "pending",
                None,
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = notify_service(&mock_server);
    let notification = service
        .enqueue(
            EnqueueNotification {
                user_id,
                notification_type: NotificationType::General,
                subject: "Welcome".to_string(),
                message: "Hello".to_string(),
                delivery_method: DeliveryMethod::Email,
                appointment_id: None,
            },
            "token",
        )
        .await
        .expect("enqueue should succeed");

    assert_eq!(notification.status, NotificationStatus::Pending);
}

#[tokio::test]
async fn test_cancellation_by_patient_notifies_doctor() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockTableRows::profile(&patient_id.to_string(), "patient@example.com", "Test Patient", "patient")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockTableRows::profile(&doctor_id.to_string(), "doctor@example.com", "Dr. Test", "doctor")
        ])))
        .mount(&mock_server)
        .await;

    // The doctor, not the cancelling patient, receives the notice.
    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .and(body_partial_json(json!({
            "user_id": doctor_id,
            "notification_type": "cancellation",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockTableRows::notification(
                &Uuid::new_v4().to_string(),
                &doctor_id.to_string(),
                "cancellation",
                "pending",
                None,
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = notify_service(&mock_server);
    service
        .queue_cancellation_notice(&details(patient_id, doctor_id), CancelledBy::Patient, "token")
        .await
        .expect("cancellation notice should queue");
}

#[tokio::test]
async fn test_cancellation_by_doctor_notifies_patient() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockTableRows::profile(&patient_id.to_string(), "patient@example.com", "Test Patient", "patient")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .and(body_partial_json(json!({
            "user_id": patient_id,
            "notification_type": "cancellation",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockTableRows::notification(
                &Uuid::new_v4().to_string(),
                &patient_id.to_string(),
                "cancellation",
                "pending",
                None,
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = notify_service(&mock_server);
    service
        .queue_cancellation_notice(&details(patient_id, doctor_id), CancelledBy::Doctor, "token")
        .await
        .expect("cancellation notice should queue");
}

#[tokio::test]
async fn test_booking_confirmation_skipped_when_profiles_missing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = notify_service(&mock_server);
    service
        .queue_booking_confirmation(&details(Uuid::new_v4(), Uuid::new_v4()), "token")
        .await
        .expect("missing profiles should be skipped, not failed");
}
