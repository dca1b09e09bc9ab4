use crate::core::{AccessCheck, AuthorizeSubject};
use anyhow::Result;
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SubjectAccessReview, SubjectAccessReviewSpec,
};
use kube::api::{Api, PostParams};

/// Answers role checks by creating `SubjectAccessReview`s.
#[derive(Clone)]
pub struct SubjectAccessReviewer {
    client: kube::Client,
}

// === impl SubjectAccessReviewer ===

impl SubjectAccessReviewer {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl AuthorizeSubject for SubjectAccessReviewer {
    async fn check_access(&self, check: &AccessCheck<'_>) -> Result<bool> {
        let api = Api::<SubjectAccessReview>::all(self.client.clone());
        let review = api
            .create(&PostParams::default(), &subject_access_review(check))
            .await?;
        let status = review.status.unwrap_or_default();
        tracing::debug!(
            namespace = %check.namespace,
            user = %check.subject.username,
            allowed = status.allowed,
            reason = status.reason.as_deref().unwrap_or_default(),
            "SubjectAccessReview"
        );
        Ok(status.allowed)
    }
}

fn subject_access_review(check: &AccessCheck<'_>) -> SubjectAccessReview {
    let subject = check.subject;
    SubjectAccessReview {
        metadata: Default::default(),
        spec: SubjectAccessReviewSpec {
            user: Some(subject.username.clone()),
            groups: Some(subject.groups.clone()).filter(|g| !g.is_empty()),
            uid: subject.uid.clone(),
            extra: Some(subject.extra.clone()).filter(|e| !e.is_empty()),
            resource_attributes: Some(ResourceAttributes {
                namespace: Some(check.namespace.to_string()),
                verb: Some(check.verb.to_string()),
                group: Some(check.group.to_string()),
                resource: Some(check.resource.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        status: None,
    }
}
