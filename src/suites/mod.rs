//! Conformance scenarios and the registry the binary selects them from

pub mod controller_revision;
pub mod csi_node;
pub mod limit_range;
pub mod storage_class;
pub mod subject_review;
pub mod volume_attachment;

use std::fmt;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use kube::Client;
use tracing::{error, info, warn};

use crate::framework::{Framework, PodSecurityLevel};
use crate::{FrameworkConfig, Result};

/// One runnable scenario
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum Suite {
    StorageClassLifecycle,
    VolumeAttachmentLifecycle,
    CsiNodeListAndGet,
    CsiNodeLifecycle,
    ControllerRevisionLifecycle,
    SubjectReview,
    LimitRangeDefaults,
    LimitRangeListPatchDeleteCollection,
}

impl Suite {
    pub const ALL: [Suite; 8] = [
        Suite::StorageClassLifecycle,
        Suite::VolumeAttachmentLifecycle,
        Suite::CsiNodeListAndGet,
        Suite::CsiNodeLifecycle,
        Suite::ControllerRevisionLifecycle,
        Suite::SubjectReview,
        Suite::LimitRangeDefaults,
        Suite::LimitRangeListPatchDeleteCollection,
    ];

    /// Name accepted by `--suite`
    pub fn name(&self) -> &'static str {
        match self {
            Suite::StorageClassLifecycle => "storage-class-lifecycle",
            Suite::VolumeAttachmentLifecycle => "volume-attachment-lifecycle",
            Suite::CsiNodeListAndGet => "csi-node-list-and-get",
            Suite::CsiNodeLifecycle => "csi-node-lifecycle",
            Suite::ControllerRevisionLifecycle => "controller-revision-lifecycle",
            Suite::SubjectReview => "subject-review",
            Suite::LimitRangeDefaults => "limit-range-defaults",
            Suite::LimitRangeListPatchDeleteCollection => "limit-range-list-patch-delete-collection",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Suite::StorageClassLifecycle => {
                "should run through the lifecycle of a StorageClass"
            }
            Suite::VolumeAttachmentLifecycle => {
                "should run through the lifecycle of a VolumeAttachment"
            }
            Suite::CsiNodeListAndGet => "should list and get CSINodes",
            Suite::CsiNodeLifecycle => "should run through the lifecycle of a CSINode",
            Suite::ControllerRevisionLifecycle => {
                "should test the lifecycle of a ControllerRevision"
            }
            Suite::SubjectReview => {
                "should support SubjectAccessReview and LocalSubjectAccessReview API operations"
            }
            Suite::LimitRangeDefaults => {
                "should create a LimitRange with defaults and ensure pod has those defaults applied"
            }
            Suite::LimitRangeListPatchDeleteCollection => {
                "should ensure that a limitRange can be listed, patched and deleted by collection"
            }
        }
    }

    /// Prefix of the namespace created for the suite
    pub fn base_name(&self) -> &'static str {
        match self {
            Suite::StorageClassLifecycle => "csi-storageclass",
            Suite::VolumeAttachmentLifecycle => "volumeattachment",
            Suite::CsiNodeListAndGet | Suite::CsiNodeLifecycle => "csinodes",
            Suite::ControllerRevisionLifecycle => "controllerrevisions",
            Suite::SubjectReview => "subjectreview",
            Suite::LimitRangeDefaults | Suite::LimitRangeListPatchDeleteCollection => {
                "limitrange"
            }
        }
    }

    /// Pod security level enforced on the suite's namespace
    pub fn pod_security_level(&self) -> PodSecurityLevel {
        match self {
            Suite::StorageClassLifecycle
            | Suite::ControllerRevisionLifecycle
            | Suite::LimitRangeDefaults
            | Suite::LimitRangeListPatchDeleteCollection => PodSecurityLevel::Baseline,
            Suite::SubjectReview => PodSecurityLevel::Privileged,
            Suite::VolumeAttachmentLifecycle
            | Suite::CsiNodeListAndGet
            | Suite::CsiNodeLifecycle => PodSecurityLevel::default(),
        }
    }

    pub async fn run(&self, f: &Framework) -> Result<()> {
        match self {
            Suite::StorageClassLifecycle => storage_class::lifecycle(f).await,
            Suite::VolumeAttachmentLifecycle => volume_attachment::lifecycle(f).await,
            Suite::CsiNodeListAndGet => csi_node::list_and_get(f).await,
            Suite::CsiNodeLifecycle => csi_node::lifecycle(f).await,
            Suite::ControllerRevisionLifecycle => controller_revision::lifecycle(f).await,
            Suite::SubjectReview => subject_review::run(f).await,
            Suite::LimitRangeDefaults => limit_range::defaults_applied(f).await,
            Suite::LimitRangeListPatchDeleteCollection => {
                limit_range::list_patch_delete_collection(f).await
            }
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one suite run, for the summary
#[derive(Debug)]
pub struct SuiteOutcome {
    pub suite: Suite,
    pub duration: Duration,
    pub result: Result<()>,
}

impl SuiteOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Build a framework for `suite`, run it and tear the framework down
///
/// Teardown runs whether or not the scenario passed. A teardown failure is
/// only reported as the outcome when the scenario itself succeeded.
pub async fn run_suite(client: Client, suite: Suite, config: FrameworkConfig) -> SuiteOutcome {
    let started = Instant::now();
    info!("Running {}: {}", suite, suite.description());

    let result = match Framework::new(client, suite.base_name(), suite.pod_security_level(), config).await {
        Ok(framework) => {
            let result = suite.run(&framework).await;
            if let Err(e) = &result {
                error!("{} failed: {}", suite, e);
            }
            let teardown = framework.teardown().await;
            if let Err(e) = &teardown {
                warn!("Teardown of {} failed: {}", suite, e);
            }
            result.and(teardown)
        }
        Err(e) => {
            error!("Failed to set up framework for {}: {}", suite, e);
            Err(e)
        }
    };

    SuiteOutcome {
        suite,
        duration: started.elapsed(),
        result,
    }
}
