//! Side-effect free description of what a run would do.

use crate::disk_bootstrap;
use crate::stages::{stage_02_docs_tooling, stage_03_training_framework, Provisioner};
use std::fmt;
use trainprep_hal::SystemHal;

#[derive(Debug, Clone)]
pub struct StagePlan {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ProvisionPlan {
    pub stages: Vec<StagePlan>,
    pub rc_file: String,
    pub rc_block: String,
    pub commands: Vec<String>,
}

impl ProvisionPlan {
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec!["Execution plan:".to_string()];
        for (idx, stage) in self.stages.iter().enumerate() {
            lines.push(format!(
                "{:02}. {}: {}",
                idx + 1,
                stage.name,
                stage.description
            ));
        }
        lines.push(String::new());
        lines.push(format!("Appended to {}:", self.rc_file));
        lines.extend(self.rc_block.lines().map(|l| format!("    {l}")));
        lines.push(String::new());
        lines.push("Package commands:".to_string());
        lines.extend(self.commands.iter().map(|c| format!("    {c}")));
        lines
    }
}

impl fmt::Display for ProvisionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.summary_lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

pub fn build_plan<H: SystemHal + ?Sized>(p: &Provisioner<'_, H>) -> ProvisionPlan {
    let stages = p
        .stages()
        .iter()
        .map(|s| StagePlan {
            name: s.name.to_string(),
            description: s.description.clone(),
        })
        .collect();

    let pip = p.pip(true);
    let packages = &p.cfg.packages;
    let uninstall = stage_03_training_framework::uninstall_legacy(packages);
    let commands = vec![
        pip.command_line(&stage_02_docs_tooling::command(packages, &p.paths)),
        format!("{} || true", pip.command_line(&uninstall)),
        pip.command_line(&stage_03_training_framework::install_tensor_stack(packages)),
        pip.command_line(&stage_03_training_framework::install_framework(packages)),
    ];

    ProvisionPlan {
        stages,
        rc_file: p.paths.rc_file.display().to_string(),
        rc_block: disk_bootstrap::render_block(&p.cfg.disk, &disk_bootstrap::steps()),
        commands,
    }
}
