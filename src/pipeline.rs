//! Orchestrates one request: enhance → validate → (fallback once) →
//! generate → render → locate artifact.
//!
//! Recoverable failures (schema violations, unsafe content, enhancer
//! unavailability) are absorbed by the fallback path and never surface to
//! the caller. Intermediate files are written before rendering and kept on
//! every failure path for diagnosis.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Error, Result};
use sha2::{Digest, Sha256};

use crate::codegen::{generate, SceneIdRegistry};
use crate::enhancer::Enhancer;
use crate::fallback::build_fallback;
use crate::render::{render_scene, Quality};
use crate::schema::ValidatedPlan;
use crate::validator::validate;

pub const PLANS_REL_PATH: &str = "outputs/plans";
pub const SCENES_REL_PATH: &str = "outputs/scenes";

const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub root: PathBuf,
    pub quality: Quality,
    pub render_timeout: Duration,
}

impl PipelineConfig {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            quality: Quality::default(),
            render_timeout: Duration::from_secs(DEFAULT_RENDER_TIMEOUT_SECS),
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    enhancer: Option<Enhancer>,
    registry: SceneIdRegistry,
}

/// Everything produced before the external render step.
#[derive(Debug)]
pub struct CompiledScene {
    pub plan: ValidatedPlan,
    pub scene_id: String,
    pub plan_path: PathBuf,
    pub script_path: PathBuf,
    pub used_fallback: bool,
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub scene_id: String,
    pub plan_path: PathBuf,
    pub script_path: PathBuf,
    pub video_path: PathBuf,
    pub used_fallback: bool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, enhancer: Option<Enhancer>) -> Self {
        Self {
            config,
            enhancer,
            registry: SceneIdRegistry::new(),
        }
    }

    /// Builds a pipeline with the enhancer taken from environment
    /// configuration; no endpoint configured means offline templates only.
    pub fn from_env(config: PipelineConfig) -> Result<Self> {
        let enhancer = Enhancer::from_env()?;
        Ok(Self::new(config, enhancer))
    }

    pub fn registry(&self) -> &SceneIdRegistry {
        &self.registry
    }

    /// Produces a validated plan for the request, falling back at most once.
    /// Hints from a rejected enhancer plan are carried into the fallback so
    /// template selection still benefits from them.
    fn plan_scene(&self, text: &str) -> Result<(ValidatedPlan, bool)> {
        let mut carried_hints: Vec<String> = Vec::new();

        if let Some(enhancer) = &self.enhancer {
            match enhancer.enhance(text) {
                Ok(raw) => match validate(&raw) {
                    Ok(plan) => return Ok((plan, false)),
                    Err(failure) => {
                        eprintln!("enhanced plan rejected, falling back: {failure}");
                        carried_hints = raw.hints;
                    }
                },
                Err(error) => {
                    eprintln!("enhancer unavailable, falling back: {error:#}");
                }
            }
        }

        let raw = build_fallback(&carried_hints, text);
        let plan = validate(&raw)
            .map_err(Error::new)
            .context("fallback plan failed validation")?;
        Ok((plan, true))
    }

    /// Runs everything up to (not including) the external render step.
    pub fn compile(&self, text: &str) -> Result<CompiledScene> {
        let (plan, used_fallback) = self.plan_scene(text)?;
        let plan_path = self.write_plan(&plan)?;

        let generated = generate(&plan, &self.registry)?;

        let scenes_dir = self.config.root.join(SCENES_REL_PATH);
        fs::create_dir_all(&scenes_dir)
            .with_context(|| format!("failed to create {}", scenes_dir.display()))?;
        let script_path = scenes_dir.join(format!("{}.py", generated.scene_id));
        fs::write(&script_path, &generated.source)
            .with_context(|| format!("failed to write {}", script_path.display()))?;

        Ok(CompiledScene {
            plan,
            scene_id: generated.scene_id,
            plan_path,
            script_path,
            used_fallback,
        })
    }

    /// Full request: compile, render, locate the artifact.
    pub fn run(&self, text: &str) -> Result<PipelineOutcome> {
        let compiled = self.compile(text)?;

        let video_path = render_scene(
            &compiled.script_path,
            &compiled.scene_id,
            self.config.quality,
            self.config.render_timeout,
            &self.config.root,
        )
        .with_context(|| {
            format!(
                "scene {} not rendered; intermediates preserved: plan {}, script {}",
                compiled.scene_id,
                compiled.plan_path.display(),
                compiled.script_path.display()
            )
        })?;

        Ok(PipelineOutcome {
            scene_id: compiled.scene_id,
            plan_path: compiled.plan_path,
            script_path: compiled.script_path,
            video_path,
            used_fallback: compiled.used_fallback,
        })
    }

    /// Plans are filed by content hash, so identical plans land on the same
    /// path and rerunning a request never litters the plans directory.
    fn write_plan(&self, plan: &ValidatedPlan) -> Result<PathBuf> {
        let plans_dir = self.config.root.join(PLANS_REL_PATH);
        fs::create_dir_all(&plans_dir)
            .with_context(|| format!("failed to create {}", plans_dir.display()))?;

        let body = serde_json::to_string_pretty(plan).context("failed to serialize plan")?;
        let digest = format!("{:x}", Sha256::digest(body.as_bytes()));
        let path = plans_dir.join(format!("plan_{}.json", &digest[..8]));
        fs::write(&path, &body).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}
