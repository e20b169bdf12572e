//! Pipeline coordinator: version check, file sync, runtime, patching, variant
//!
//! A run walks the states in [`PipelineState`] in order. Every stage either
//! advances or moves the run to `Failed` with the error that stopped it;
//! nothing already done is rolled back.

pub mod state;

pub use state::{PipelineStage, PipelineState};

use crate::config::{LauncherConfig, LauncherPaths};
use crate::errors::PipelineError;
use crate::installation::{Downloader, Platform, RuntimeInstall, RuntimeProvisioner, ToolProvisioner};
use crate::patcher::{DomainPatcher, PatchSummary};
use crate::progress::ProgressReporter;
use crate::variant::{VariantInstaller, VariantOutcome};
use crate::versions::{check_versions, HttpVersionSource, VersionSource, VersionState};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// What a file sync has to bring the game directory up to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub version: String,
    pub game_dir: PathBuf,
    pub tools_dir: PathBuf,
    pub cache_dir: PathBuf,
}

/// Brings the game files to the requested version
#[async_trait]
pub trait FileSync: Send + Sync {
    async fn sync(&self, request: &SyncRequest, progress: &ProgressReporter) -> Result<(), PipelineError>;
}

/// Default [`FileSync`]: provisions the butler tool that applies game deltas
///
/// Applying the deltas themselves is done by butler's caller.
#[derive(Debug, Clone)]
pub struct ToolSync {
    tools: ToolProvisioner,
}

impl ToolSync {
    pub fn new(tools: ToolProvisioner) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl FileSync for ToolSync {
    async fn sync(&self, request: &SyncRequest, progress: &ProgressReporter) -> Result<(), PipelineError> {
        let tool = self.tools.ensure_tool(&request.tools_dir, progress).await?;
        log::info!(
            "Delivery tool ready at {} for version {}",
            tool.path.display(),
            request.version
        );
        Ok(())
    }
}

/// Outcome of [`Pipeline::run`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub success: bool,
    pub state: PipelineState,
    pub history: Vec<PipelineState>,
    pub versions: Option<VersionState>,
    pub runtime: Option<RuntimeInstall>,
    pub patch: Option<PatchSummary>,
    pub variant: Option<VariantOutcome>,
    pub error: Option<String>,
    pub failed_stage: Option<PipelineStage>,
}

impl PipelineReport {
    fn start() -> Self {
        Self {
            success: false,
            state: PipelineState::CheckingVersions,
            history: vec![PipelineState::CheckingVersions],
            versions: None,
            runtime: None,
            patch: None,
            variant: None,
            error: None,
            failed_stage: None,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        if !self.state.can_transition_to(&next) {
            log::warn!("Unexpected pipeline transition {:?} -> {:?}", self.state, next);
        }
        log::info!("Pipeline state: {:?}", next);
        self.success = next == PipelineState::Ready;
        self.history.push(next.clone());
        self.state = next;
    }

    fn fail(mut self, stage: PipelineStage, error: String) -> Self {
        log::error!("Pipeline failed while {}: {}", stage, error);
        self.advance(PipelineState::Failed {
            stage,
            error: error.clone(),
        });
        self.error = Some(error);
        self.failed_stage = Some(stage);
        self
    }
}

pub struct Pipeline {
    paths: LauncherPaths,
    versions: Arc<dyn VersionSource>,
    sync: Arc<dyn FileSync>,
    runtime: RuntimeProvisioner,
    patcher: DomainPatcher,
    variant: VariantInstaller,
    progress: ProgressReporter,
}

impl Pipeline {
    pub fn new(
        paths: LauncherPaths,
        versions: Arc<dyn VersionSource>,
        sync: Arc<dyn FileSync>,
        runtime: RuntimeProvisioner,
        patcher: DomainPatcher,
        variant: VariantInstaller,
    ) -> Self {
        Self {
            paths,
            versions,
            sync,
            runtime,
            patcher,
            variant,
            progress: ProgressReporter::disabled(),
        }
    }

    /// Wire every component from configuration
    pub fn from_config(config: &LauncherConfig, paths: LauncherPaths) -> Result<Self, PipelineError> {
        let downloader = Downloader::from_config(&config.transfer)?;
        let versions = Arc::new(HttpVersionSource::new(downloader.clone(), config));
        let sync = Arc::new(ToolSync::new(ToolProvisioner::new(
            downloader.clone(),
            &config.endpoints.tool_base,
        )));
        let runtime = RuntimeProvisioner::new(downloader.clone(), &config.endpoints.runtime_manifest);
        let variant = VariantInstaller::new(downloader, &config.endpoints.variant_download);

        Ok(Self::new(
            paths,
            versions,
            sync,
            runtime,
            DomainPatcher::from_config(config),
            variant,
        ))
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_sync(mut self, sync: Arc<dyn FileSync>) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_versions(mut self, versions: Arc<dyn VersionSource>) -> Self {
        self.versions = versions;
        self
    }

    /// Resolve runtime, client paths and variant support for another platform
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.runtime = self.runtime.with_platform(platform.clone());
        self.patcher = self.patcher.with_platform(platform.clone());
        self.variant = self.variant.with_platform(platform);
        self
    }

    pub fn paths(&self) -> &LauncherPaths {
        &self.paths
    }

    pub async fn run(&self) -> PipelineReport {
        let mut report = PipelineReport::start();

        self.progress.message("Checking for updates...", Some(0.0));
        let versions = check_versions(self.versions.as_ref()).await;
        report.versions = Some(versions.clone());

        if !versions.needs_update() {
            log::info!("Game is up to date ({})", versions.latest);
            report.advance(PipelineState::UpToDate);
            report.advance(PipelineState::Ready);
            self.progress.message("Game is up to date", Some(100.0));
            return report;
        }

        report.advance(PipelineState::UpdateNeeded);
        self.progress
            .message("Game update required, starting update process...", Some(5.0));

        report.advance(PipelineState::SyncingFiles);
        let request = SyncRequest {
            version: versions.latest.clone(),
            game_dir: self.paths.game_dir.clone(),
            tools_dir: self.paths.tools_dir.clone(),
            cache_dir: self.paths.cache_dir.clone(),
        };
        if let Err(e) = self
            .sync
            .sync(&request, &self.progress.scoped(None, 5.0, 45.0))
            .await
        {
            return report.fail(PipelineStage::SyncingFiles, e.to_string());
        }

        report.advance(PipelineState::ProvisioningRuntime);
        match self
            .runtime
            .ensure_runtime(
                &self.paths.cache_dir,
                &self.paths.jre_dir,
                &self.progress.scoped(None, 50.0, 25.0),
            )
            .await
        {
            Ok(install) => report.runtime = Some(install),
            Err(e) => return report.fail(PipelineStage::ProvisioningRuntime, e.to_string()),
        }

        report.advance(PipelineState::PatchingBinaries);
        let summary = self
            .patcher
            .ensure_patched(&self.paths.game_dir, &self.progress.scoped(None, 75.0, 20.0))
            .await;
        let patch_error = summary.error_message();
        report.patch = Some(summary);
        if let Some(error) = patch_error {
            return report.fail(PipelineStage::PatchingBinaries, error);
        }

        report.advance(PipelineState::CheckingOptionalVariant);
        match self.check_variant(&versions, &mut report).await {
            Ok(outcome) => report.variant = Some(outcome),
            Err(e) => return report.fail(PipelineStage::CheckingOptionalVariant, e.to_string()),
        }

        report.advance(PipelineState::Ready);
        self.progress.message("Ready", Some(100.0));
        report
    }

    /// Install the variant if offered, then patch the freshly installed client
    async fn check_variant(
        &self,
        versions: &VersionState,
        report: &mut PipelineReport,
    ) -> Result<VariantOutcome, PipelineError> {
        let progress = self.progress.scoped(None, 95.0, 5.0);
        let outcome = self
            .variant
            .check_and_install(
                &self.paths.game_dir,
                &versions.latest,
                versions.optional_variant.as_deref(),
                &progress,
            )
            .await?;

        if outcome.installed {
            let client = self
                .patcher
                .find_client_path(&self.paths.game_dir)
                .ok_or_else(|| PipelineError::ArtifactNotFound {
                    path: self.paths.game_dir.join("Client"),
                })?;
            let client_outcome = self
                .patcher
                .patch_client(&client, &progress)
                .await
                .map_err(|e| e.context("Failed to patch variant client"))?;

            if let Some(previous) = report.patch.take() {
                report.patch = Some(PatchSummary::from_outcomes(client_outcome, previous.server));
            }
        }

        Ok(outcome)
    }
}
