use std::collections::HashSet;

use crate::{async_trait, TopicAdmin as TopicAdminInterface, TopicConfig};
use mockall::mock;

mock! {
    pub TopicAdmin {}

    #[async_trait]
    impl TopicAdminInterface for TopicAdmin {
        async fn create_topic(&self, spec: &TopicConfig) -> bool;
        async fn list_topics(&self) -> HashSet<String>;
        async fn delete_topic(&self, name: &str) -> bool;
    }
}

impl MockTopicAdmin {
    pub fn list_topics<'a>(mut self, topics: impl IntoIterator<Item = &'a str>) -> Self {
        let topics: HashSet<String> = topics.into_iter().map(str::to_string).collect();

        self.expect_list_topics()
            .times(1)
            .returning(move || topics.clone());

        self
    }

    pub fn create_topic(mut self, name: &str, created: bool) -> Self {
        let name = name.to_string();

        self.expect_create_topic()
            .times(1)
            .withf(move |spec| spec.name == name)
            .returning(move |_| created);

        self
    }

    pub fn delete_topic(mut self, name: &str, deleted: bool) -> Self {
        let name = name.to_string();

        self.expect_delete_topic()
            .times(1)
            .withf(move |topic| topic == name)
            .returning(move |_| deleted);

        self
    }
}
