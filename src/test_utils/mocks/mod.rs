mod procurement_source_mock;
mod streaming_client_mock;
mod topic_admin_mock;

pub use procurement_source_mock::MockProcurementSource;
pub use streaming_client_mock::MockStreamingClient;
pub use topic_admin_mock::MockTopicAdmin;
