//! SubjectAccessReview and LocalSubjectAccessReview

use k8s_openapi::api::authorization::v1::{LocalSubjectAccessReview, SubjectAccessReview};
use kube::Api;
use kube::api::PostParams;
use tracing::{debug, info};

use crate::fixtures::{local_subject_access_review, subject_access_review};
use crate::framework::Framework;
use crate::{Error, Result, dump};

pub async fn run(f: &Framework) -> Result<()> {
    let ns = f.namespace();

    info!("Creating SubjectAccessReview in {:?} namespace", ns);
    let sar = subject_access_review(ns, "*", "list");
    debug!("sar:\n{}", dump(&sar));

    let reviews: Api<SubjectAccessReview> = Api::all(f.client());
    let sar_response = reviews.create(&PostParams::default(), &sar).await?;
    debug!("sarResponse:\n{}", dump(&sar_response));
    let status = sar_response.status.as_ref().ok_or_else(|| {
        Error::assertion("SubjectAccessReview response carries no status")
    })?;
    info!(
        "SubjectAccessReview for user \"*\": allowed={}, reason={:?}",
        status.allowed, status.reason
    );

    info!("Creating a LocalSubjectAccessReview in {:?} namespace", ns);
    let lsar = local_subject_access_review(ns, "alice");
    debug!("lsar:\n{}", dump(&lsar));

    let local_reviews: Api<LocalSubjectAccessReview> = Api::namespaced(f.client(), ns);
    let lsar_response = local_reviews.create(&PostParams::default(), &lsar).await?;
    debug!("lsarResponse:\n{}", dump(&lsar_response));
    let status = lsar_response.status.as_ref().ok_or_else(|| {
        Error::assertion("LocalSubjectAccessReview response carries no status")
    })?;
    info!(
        "LocalSubjectAccessReview for user \"alice\": allowed={}, reason={:?}",
        status.allowed, status.reason
    );

    Ok(())
}
