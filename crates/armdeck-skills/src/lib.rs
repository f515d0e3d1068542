//! `armdeck-skills` – placeholder policy skills.
//!
//! A [`Skill`] maps one observation (image + joint snapshot) to one action
//! vector via an externally trained policy checkpoint. The search and grasp
//! skills are near-identical forward-pass wrappers; no inference backend
//! ships with the demo, so a loaded skill answers with a hold-position
//! action and the real model is expected to be dropped in behind the same
//! trait.

use std::path::PathBuf;

use armdeck_hal::ArmImage;
use armdeck_types::{ArmError, JointMap};
use tracing::info;

/// One-observation-in, one-action-out policy wrapper.
pub trait Skill: Send {
    /// Skill name, e.g. `"search"` or `"grasp"`.
    fn id(&self) -> &str;

    /// Load the policy checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::PolicyUnavailable`] when no checkpoint path is
    /// configured or the path does not exist.
    fn load(&mut self) -> Result<(), ArmError>;

    /// Single forward pass: observation in, joint-space action out.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::PolicyUnavailable`] when [`load`][Self::load] has
    /// not succeeded.
    fn step(&mut self, image: &ArmImage, joints: &JointMap) -> Result<JointMap, ArmError>;
}

/// Shared implementation behind [`SearchSkill`] and [`GraspSkill`].
struct PolicySkill {
    name: &'static str,
    policy_path: Option<PathBuf>,
    loaded: bool,
}

impl PolicySkill {
    fn new(name: &'static str, policy_path: Option<PathBuf>) -> Self {
        Self {
            name,
            policy_path,
            loaded: false,
        }
    }
}

impl Skill for PolicySkill {
    fn id(&self) -> &str {
        self.name
    }

    fn load(&mut self) -> Result<(), ArmError> {
        let path = self.policy_path.as_ref().ok_or_else(|| {
            ArmError::PolicyUnavailable(format!(
                "{}: no policy checkpoint path configured",
                self.name
            ))
        })?;
        if !path.exists() {
            return Err(ArmError::PolicyUnavailable(format!(
                "{}: checkpoint not found at {}",
                self.name,
                path.display()
            )));
        }
        info!(skill = self.name, path = %path.display(), "policy checkpoint located");
        self.loaded = true;
        Ok(())
    }

    fn step(&mut self, _image: &ArmImage, joints: &JointMap) -> Result<JointMap, ArmError> {
        if !self.loaded {
            return Err(ArmError::PolicyUnavailable(format!(
                "{}: step called before load", self.name
            )));
        }
        // Placeholder forward pass: hold the current joint positions. A real
        // policy plugs in behind the same trait.
        Ok(joints.clone())
    }
}

/// Search skill – pans the camera until the target object is visible.
pub struct SearchSkill(PolicySkill);

impl SearchSkill {
    pub fn new(policy_path: Option<PathBuf>) -> Self {
        Self(PolicySkill::new("search", policy_path))
    }
}

impl Skill for SearchSkill {
    fn id(&self) -> &str {
        self.0.id()
    }
    fn load(&mut self) -> Result<(), ArmError> {
        self.0.load()
    }
    fn step(&mut self, image: &ArmImage, joints: &JointMap) -> Result<JointMap, ArmError> {
        self.0.step(image, joints)
    }
}

/// Grasp skill – moves the end-effector onto the located object.
pub struct GraspSkill(PolicySkill);

impl GraspSkill {
    pub fn new(policy_path: Option<PathBuf>) -> Self {
        Self(PolicySkill::new("grasp", policy_path))
    }
}

impl Skill for GraspSkill {
    fn id(&self) -> &str {
        self.0.id()
    }
    fn load(&mut self) -> Result<(), ArmError> {
        self.0.load()
    }
    fn step(&mut self, image: &ArmImage, joints: &JointMap) -> Result<JointMap, ArmError> {
        self.0.step(image, joints)
    }
}
