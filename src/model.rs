// Domain types for bundle files, build manifests, and the generated model document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{EXPRESSIONS_DIR, MODEL_FILE_NAME, MOTIONS_DIR, PHYSICS_FILE_NAME, TEXTURES_DIR};

/// One remote blob inside a named content bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleFile {
    pub bundle_name: String,
    pub file_name: String,
}

impl BundleFile {
    pub fn new(bundle_name: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            bundle_name: bundle_name.into(),
            file_name: file_name.into(),
        }
    }

    /// Remove the synthetic `.bytes` suffix the asset host appends to
    /// model and motion file names.
    pub fn strip_bytes_suffix(&mut self) {
        if let Some(stripped) = self.file_name.strip_suffix(".bytes") {
            self.file_name = stripped.to_string();
        }
    }

    /// Guarantee texture file names carry a `.png` suffix.
    pub fn ensure_png_suffix(&mut self) {
        if !self.file_name.ends_with(".png") {
            self.file_name.push_str(".png");
        }
    }
}

/// The set of bundle files required to assemble one model, as served by the
/// remote catalog's `buildData.asset` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildData {
    #[serde(default)]
    pub model: BundleFile,
    #[serde(default)]
    pub physics: BundleFile,
    #[serde(default)]
    pub textures: Vec<BundleFile>,
    #[serde(default)]
    pub motions: Vec<BundleFile>,
    #[serde(default)]
    pub expressions: Vec<BundleFile>,
}

impl BuildData {
    /// Apply the catalog's file-name normalization rules.
    pub fn normalize(&mut self) {
        self.model.strip_bytes_suffix();
        for motion in &mut self.motions {
            motion.strip_bytes_suffix();
        }
        for texture in &mut self.textures {
            texture.ensure_png_suffix();
        }
    }

    /// Total number of files a build of this manifest accounts for,
    /// including the optional physics file.
    pub fn total_files(&self) -> usize {
        2 + self.textures.len() + self.motions.len() + self.expressions.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionFile {
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionFile {
    pub name: String,
    pub file: String,
}

/// Category a file belongs to, derived from its relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Model,
    Physics,
    Texture,
    Motion,
    Expression,
    Unknown,
}

/// Classify a relative file path into its asset category.
pub fn classify(rel_path: &str) -> FileKind {
    if rel_path.ends_with(MODEL_FILE_NAME) {
        FileKind::Model
    } else if rel_path.ends_with(PHYSICS_FILE_NAME) {
        FileKind::Physics
    } else if rel_path.contains(TEXTURES_DIR) {
        FileKind::Texture
    } else if rel_path.contains(MOTIONS_DIR) {
        FileKind::Motion
    } else if rel_path.contains(EXPRESSIONS_DIR) {
        FileKind::Expression
    } else {
        FileKind::Unknown
    }
}

/// Base name of a relative path, truncated at the first `.`.
fn base_stem(rel_path: &str) -> String {
    let base = rel_path.rsplit('/').next().unwrap_or(rel_path);
    base.split('.').next().unwrap_or(base).to_string()
}

/// Per-build accumulator mapping each category to its resolved relative paths.
///
/// Owned solely by one model builder for the duration of a build.
#[derive(Debug, Clone, Default)]
pub struct Live2dModel {
    pub model: String,
    pub physics: String,
    pub textures: Vec<String>,
    pub motions: BTreeMap<String, Vec<MotionFile>>,
    pub expressions: Vec<ExpressionFile>,
}

impl Live2dModel {
    /// Fold one resolved file into the accumulator. Unknown categories are
    /// tolerated and ignored; a repeated motion name replaces the prior entry.
    pub fn apply(&mut self, rel_path: &str) {
        match classify(rel_path) {
            FileKind::Model => self.model = rel_path.to_string(),
            FileKind::Physics => self.physics = rel_path.to_string(),
            FileKind::Texture => self.textures.push(rel_path.to_string()),
            FileKind::Motion => {
                self.motions.insert(
                    base_stem(rel_path),
                    vec![MotionFile {
                        file: rel_path.to_string(),
                    }],
                );
            }
            FileKind::Expression => self.expressions.push(ExpressionFile {
                name: base_stem(rel_path),
                file: rel_path.to_string(),
            }),
            FileKind::Unknown => {}
        }
    }
}

/// Fixed layout block, identical across every generated manifest.
#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
}

/// Fixed hit-area block, identical across every generated manifest.
#[derive(Debug, Clone, Serialize)]
pub struct HitAreas {
    pub body_x: [f64; 2],
    pub body_y: [f64; 2],
    pub head_x: [f64; 2],
    pub head_y: [f64; 2],
}

/// The generated `model.json` document.
///
/// Field order is the serialization order; motions are a `BTreeMap`, so two
/// serializations of equal content are byte-identical.
#[derive(Debug, Clone, Serialize)]
pub struct ModelManifest {
    pub version: String,
    pub layout: Layout,
    pub hit_areas_custom: HitAreas,
    pub model: String,
    pub physics: String,
    pub textures: Vec<String>,
    pub motions: BTreeMap<String, Vec<MotionFile>>,
    pub expressions: Vec<ExpressionFile>,
}

impl ModelManifest {
    pub fn from_document(document: &Live2dModel) -> Self {
        Self {
            version: "Sample 1.0.0".to_string(),
            layout: Layout {
                center_x: 0.0,
                center_y: 0.0,
                width: 2.0,
            },
            hit_areas_custom: HitAreas {
                body_x: [-0.3, 0.2],
                body_y: [0.3, -1.9],
                head_x: [-0.25, 1.0],
                head_y: [0.25, 0.2],
            },
            model: document.model.clone(),
            physics: document.physics.clone(),
            textures: document.textures.clone(),
            motions: document.motions.clone(),
            expressions: document.expressions.clone(),
        }
    }
}

/// A character matched by the fuzzy roster search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchChara {
    pub id: u32,
    pub name: String,
    pub names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bytes_suffix() {
        let mut file = BundleFile::new("live2d/chara/001_casual", "model.moc.bytes");
        file.strip_bytes_suffix();
        assert_eq!(file.file_name, "model.moc");

        // Idempotent on names without the suffix.
        file.strip_bytes_suffix();
        assert_eq!(file.file_name, "model.moc");
    }

    #[test]
    fn test_ensure_png_suffix() {
        let mut file = BundleFile::new("b", "texture_00");
        file.ensure_png_suffix();
        assert_eq!(file.file_name, "texture_00.png");

        file.ensure_png_suffix();
        assert_eq!(file.file_name, "texture_00.png");
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("data/model.moc"), FileKind::Model);
        assert_eq!(classify("data/physics.json"), FileKind::Physics);
        assert_eq!(classify("data/textures/texture_00.png"), FileKind::Texture);
        assert_eq!(classify("data/motions/idle01.mtn"), FileKind::Motion);
        assert_eq!(classify("data/expressions/smile.json"), FileKind::Expression);
        assert_eq!(classify("data/readme.txt"), FileKind::Unknown);
    }

    #[test]
    fn test_apply_motion_replaces_repeated_name() {
        let mut doc = Live2dModel::default();
        doc.apply("data/motions/idle01.mtn");
        doc.apply("data/motions/idle01.mtn.alt");
        assert_eq!(doc.motions.len(), 1);
        assert_eq!(doc.motions["idle01"][0].file, "data/motions/idle01.mtn.alt");
    }

    #[test]
    fn test_apply_expression_keeps_stem_name() {
        let mut doc = Live2dModel::default();
        doc.apply("data/expressions/smile.exp.json");
        assert_eq!(doc.expressions.len(), 1);
        assert_eq!(doc.expressions[0].name, "smile");
        assert_eq!(doc.expressions[0].file, "data/expressions/smile.exp.json");
    }

    #[test]
    fn test_manifest_serialization_is_deterministic() {
        let mut doc = Live2dModel::default();
        doc.apply("data/model.moc");
        doc.apply("data/textures/texture_01.png");
        doc.apply("data/textures/texture_00.png");
        doc.apply("data/motions/walk.mtn");
        doc.apply("data/motions/idle.mtn");

        let first = serde_json::to_vec_pretty(&ModelManifest::from_document(&doc)).unwrap();
        let second = serde_json::to_vec_pretty(&ModelManifest::from_document(&doc)).unwrap();
        assert_eq!(first, second);

        // Texture order is insertion order; motion keys are sorted.
        let value: serde_json::Value = serde_json::from_slice(&first).unwrap();
        assert_eq!(value["textures"][0], "data/textures/texture_01.png");
        let motion_keys: Vec<&String> = value["motions"].as_object().unwrap().keys().collect();
        assert_eq!(motion_keys, ["idle", "walk"]);
    }

    #[test]
    fn test_build_data_total_files() {
        let data = BuildData {
            textures: vec![BundleFile::default(); 2],
            motions: vec![BundleFile::default(); 3],
            expressions: vec![BundleFile::default(); 1],
            ..BuildData::default()
        };
        assert_eq!(data.total_files(), 8);
    }
}
