//! Notice manager implementation using minijinja.

use crate::{
    engine::{NoticeEngine, NoticeKind},
    error::{NoticeError, Result},
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const BUILTIN_TEMPLATES: [(&str, &str); 3] = [
    ("transition.j2", include_str!("../templates/transition.j2")),
    ("gate_review.j2", include_str!("../templates/gate_review.j2")),
    ("progress.j2", include_str!("../templates/progress.j2")),
];

fn builtin_source(name: &str) -> Option<&'static str> {
    BUILTIN_TEMPLATES
        .iter()
        .find(|(file, _)| *file == name)
        .map(|(_, source)| *source)
}

/// Manager for loading and rendering notice templates.
///
/// Templates come from a user directory when one is configured, with the
/// built-in `transition`, `gate_review` and `progress` templates used for
/// any name the directory does not provide.
///
/// # Examples
///
/// ```no_run
/// use phasegate_notice::{NoticeContext, NoticeEngine, NoticeManager};
/// use std::path::PathBuf;
///
/// let manager = NoticeManager::new(PathBuf::from("./templates"))?;
/// let ctx = NoticeContext::new("CAPA-1", "Label misprint").with_phases("CORRECTION", "ROOT_CAUSE_ANALYSIS");
/// let text = manager.render("transition", &ctx)?;
/// # Ok::<(), phasegate_notice::NoticeError>(())
/// ```
#[derive(Debug)]
pub struct NoticeManager {
    /// Directory containing user template files, if any.
    pub templates_dir: Option<PathBuf>,
    env: minijinja::Environment<'static>,
}

impl NoticeManager {
    /// Creates a manager reading `.j2` files from `templates_dir`.
    ///
    /// # Errors
    ///
    /// Returns `NoticeError::TemplateDirectoryNotFound` if the directory does
    /// not exist or is not a directory.
    pub fn new(templates_dir: PathBuf) -> Result<Self> {
        if !templates_dir.is_dir() {
            return Err(NoticeError::TemplateDirectoryNotFound(templates_dir));
        }

        let fs_loader = minijinja::path_loader(&templates_dir);
        let mut env = minijinja::Environment::new();
        env.set_loader(move |name| match fs_loader(name)? {
            Some(source) => Ok(Some(source)),
            None => Ok(builtin_source(name).map(str::to_string)),
        });

        Ok(Self {
            templates_dir: Some(templates_dir),
            env,
        })
    }

    /// Creates a manager with only the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns `NoticeError::InvalidBuiltinTemplate` if a built-in template
    /// fails to compile.
    pub fn builtin() -> Result<Self> {
        let mut env = minijinja::Environment::new();
        for (name, source) in BUILTIN_TEMPLATES {
            env.add_template(name, source)
                .map_err(|e| NoticeError::InvalidBuiltinTemplate {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;
        }
        Ok(Self {
            templates_dir: None,
            env,
        })
    }

    /// Uses `templates_dir` when given, otherwise the built-in templates.
    pub fn from_dir(templates_dir: Option<PathBuf>) -> Result<Self> {
        match templates_dir {
            Some(dir) => Self::new(dir),
            None => Self::builtin(),
        }
    }

    fn load_template(&self, name: &str) -> Result<minijinja::Template<'_, '_>> {
        let template_name = format!("{name}.j2");
        self.env
            .get_template(&template_name)
            .map_err(|e| NoticeError::TemplateNotFound(format!("{name}: {e}")))
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(dir).map_err(|source| NoticeError::TemplateListError {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut templates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| NoticeError::TemplateListError {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();

            if path.is_file()
                && let Some(ext) = path.extension()
                && ext == "j2"
                && let Some(name) = path.file_stem()
                && let Some(name_str) = name.to_str()
            {
                templates.push(name_str.to_string());
            }
        }
        Ok(templates)
    }
}

impl NoticeEngine for NoticeManager {
    fn render<T: Serialize>(&self, template: &str, ctx: &T) -> Result<String> {
        let tmpl = self.load_template(template)?;
        tmpl.render(ctx)
            .map_err(|e| NoticeError::TemplateRenderError(format!("{template}: {e}")))
    }

    fn list_templates(&self) -> Result<Vec<String>> {
        let mut templates: BTreeSet<String> = NoticeKind::ALL
            .iter()
            .map(|kind| kind.template_name().to_string())
            .collect();
        if let Some(dir) = &self.templates_dir {
            templates.extend(self.list_dir(dir)?);
        }
        Ok(templates.into_iter().collect())
    }
}
