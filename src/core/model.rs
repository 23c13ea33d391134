//! Project entities: targets, groups, file references, build phases and build files.
//!
//! Entities reference each other by [`ObjectId`]. Ownership and reachability
//! rules are enforced by [`ProjectGraph`](super::graph::ProjectGraph), not here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

/// 24-character uppercase hex object identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string().to_uppercase();
        Self(hex[..24].to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of build output a target produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Application,
    Framework,
    StaticLibrary,
    DynamicLibrary,
    UnitTestBundle,
    UiTestBundle,
    Bundle,
    AppExtension,
    CommandLineTool,
}

impl ProductType {
    /// File extension of the built product, if any.
    #[must_use]
    pub const fn extension(self) -> Option<&'static str> {
        match self {
            Self::Application => Some("app"),
            Self::Framework => Some("framework"),
            Self::StaticLibrary => Some("a"),
            Self::DynamicLibrary => Some("dylib"),
            Self::UnitTestBundle | Self::UiTestBundle => Some("xctest"),
            Self::Bundle => Some("bundle"),
            Self::AppExtension => Some("appex"),
            Self::CommandLineTool => None,
        }
    }

    /// Product-type identifier as written by the build tool.
    #[must_use]
    pub const fn identifier(self) -> &'static str {
        match self {
            Self::Application => "com.apple.product-type.application",
            Self::Framework => "com.apple.product-type.framework",
            Self::StaticLibrary => "com.apple.product-type.library.static",
            Self::DynamicLibrary => "com.apple.product-type.library.dynamic",
            Self::UnitTestBundle => "com.apple.product-type.bundle.unit-test",
            Self::UiTestBundle => "com.apple.product-type.bundle.ui-testing",
            Self::Bundle => "com.apple.product-type.bundle",
            Self::AppExtension => "com.apple.product-type.app-extension",
            Self::CommandLineTool => "com.apple.product-type.tool",
        }
    }

    /// Default product file name for a target of this type.
    #[must_use]
    pub fn default_product_name(self, target_name: &str) -> String {
        match self.extension() {
            Some(ext) => format!("{target_name}.{ext}"),
            None => target_name.to_string(),
        }
    }

    /// Phases a freshly created target of this type starts with.
    #[must_use]
    pub fn default_phases(self) -> Vec<PhaseKind> {
        match self {
            Self::StaticLibrary | Self::DynamicLibrary | Self::CommandLineTool => {
                vec![PhaseKind::Sources, PhaseKind::Frameworks]
            }
            _ => vec![PhaseKind::Sources, PhaseKind::Frameworks, PhaseKind::Resources],
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Anchor a reference's path is relative to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTree {
    /// Relative to the enclosing group.
    #[default]
    Group,
    /// Relative to the project root.
    SourceRoot,
    Absolute,
    BuiltProductsDir,
    SdkRoot,
    DeveloperDir,
}

impl SourceTree {
    /// Whether paths under this anchor can be checked against the project root.
    #[must_use]
    pub const fn is_filesystem_backed(self) -> bool {
        matches!(self, Self::Group | Self::SourceRoot | Self::Absolute)
    }
}

/// A child slot inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Child {
    Group(ObjectId),
    File(ObjectId),
}

impl Child {
    #[must_use]
    pub const fn id(&self) -> &ObjectId {
        match self {
            Self::Group(id) | Self::File(id) => id,
        }
    }
}

/// A container node in the file hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Filesystem path; `None` for virtual groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub source_tree: SourceTree,
    #[serde(default)]
    pub children: Vec<Child>,
}

impl Group {
    /// Creates an empty virtual group.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            path: None,
            source_tree: SourceTree::Group,
            children: Vec::new(),
        }
    }

    /// Name shown in the hierarchy: the name, else the path.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.path.as_deref())
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        self.path.is_none()
    }
}

/// A leaf node naming a file, or a built product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub source_tree: SourceTree,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_known_file_type: Option<String>,
    /// Set on product references only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_file_type: Option<ProductType>,
}

impl FileReference {
    /// Reference to a file relative to its group.
    #[must_use]
    pub fn at_path(path: impl Into<String>) -> Self {
        Self {
            name: None,
            path: Some(path.into()),
            source_tree: SourceTree::Group,
            last_known_file_type: None,
            explicit_file_type: None,
        }
    }

    /// Product reference for a target's build output.
    #[must_use]
    pub fn product(name: impl Into<String>, product_type: ProductType) -> Self {
        Self {
            name: None,
            path: Some(name.into()),
            source_tree: SourceTree::BuiltProductsDir,
            last_known_file_type: None,
            explicit_file_type: Some(product_type),
        }
    }

    /// Name shown in the hierarchy: the name, else the path's file name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if let Some(name) = self.name.as_deref() {
            return name;
        }
        self.path
            .as_deref()
            .map(|p| p.rsplit('/').next().unwrap_or(p))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_product(&self) -> bool {
        self.source_tree == SourceTree::BuiltProductsDir && self.explicit_file_type.is_some()
    }
}

/// Destination of a copy-files phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyDestination {
    Resources,
    Frameworks,
    PlugIns,
    Executables,
    ProductsDirectory,
    AbsolutePath,
}

/// Build phase kind with kind-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseKind {
    Sources,
    Resources,
    Frameworks,
    Headers,
    CopyFiles {
        destination: CopyDestination,
        #[serde(default)]
        subpath: String,
    },
    ShellScript {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        shell: String,
        script: String,
        #[serde(default)]
        run_only_for_deployment: bool,
    },
}

/// Payload-free tag used to select a phase by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKindTag {
    Sources,
    Resources,
    Frameworks,
    Headers,
    CopyFiles,
    ShellScript,
}

impl PhaseKind {
    #[must_use]
    pub const fn tag(&self) -> PhaseKindTag {
        match self {
            Self::Sources => PhaseKindTag::Sources,
            Self::Resources => PhaseKindTag::Resources,
            Self::Frameworks => PhaseKindTag::Frameworks,
            Self::Headers => PhaseKindTag::Headers,
            Self::CopyFiles { .. } => PhaseKindTag::CopyFiles,
            Self::ShellScript { .. } => PhaseKindTag::ShellScript,
        }
    }

    /// Whether the phase carries build files at all.
    #[must_use]
    pub const fn accepts_files(&self) -> bool {
        match self {
            Self::Sources
            | Self::Resources
            | Self::Frameworks
            | Self::Headers
            | Self::CopyFiles { .. } => true,
            Self::ShellScript { .. } => false,
        }
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Sources => "Sources".to_string(),
            Self::Resources => "Resources".to_string(),
            Self::Frameworks => "Frameworks".to_string(),
            Self::Headers => "Headers".to_string(),
            Self::CopyFiles { subpath, .. } if !subpath.is_empty() => {
                format!("Copy Files ({subpath})")
            }
            Self::CopyFiles { .. } => "Copy Files".to_string(),
            Self::ShellScript { name, .. } => name
                .clone()
                .unwrap_or_else(|| "Run Script".to_string()),
        }
    }
}

impl PhaseKindTag {
    /// Phase a file with this path belongs in by default.
    #[must_use]
    pub fn for_path(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "swift" | "m" | "mm" | "c" | "cc" | "cpp" | "cxx" | "s" | "metal" | "xcdatamodeld"
            | "intentdefinition" => Self::Sources,
            "h" | "hh" | "hpp" => Self::Headers,
            "framework" | "a" | "dylib" | "tbd" | "xcframework" => Self::Frameworks,
            _ => Self::Resources,
        }
    }

    /// Default payload for a phase created from a bare tag.
    #[must_use]
    pub fn default_kind(self) -> PhaseKind {
        match self {
            Self::Sources => PhaseKind::Sources,
            Self::Resources => PhaseKind::Resources,
            Self::Frameworks => PhaseKind::Frameworks,
            Self::Headers => PhaseKind::Headers,
            Self::CopyFiles => PhaseKind::CopyFiles {
                destination: CopyDestination::Resources,
                subpath: String::new(),
            },
            Self::ShellScript => PhaseKind::ShellScript {
                name: None,
                shell: "/bin/sh".to_string(),
                script: String::new(),
                run_only_for_deployment: false,
            },
        }
    }
}

/// An ordered build step of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPhase {
    #[serde(flatten)]
    pub kind: PhaseKind,
    #[serde(default)]
    pub files: Vec<ObjectId>,
}

impl BuildPhase {
    #[must_use]
    pub const fn new(kind: PhaseKind) -> Self {
        Self {
            kind,
            files: Vec::new(),
        }
    }
}

/// Association of one file reference with one build phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFile {
    pub file_ref: ObjectId,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, String>,
}

impl BuildFile {
    #[must_use]
    pub const fn new(file_ref: ObjectId) -> Self {
        Self {
            file_ref,
            settings: BTreeMap::new(),
        }
    }
}

/// A buildable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<ProductType>,
    #[serde(default)]
    pub phases: Vec<ObjectId>,
    #[serde(default)]
    pub dependencies: Vec<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ObjectId>,
    /// Overrides the default product file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

impl Target {
    #[must_use]
    pub fn new(name: impl Into<String>, product_type: Option<ProductType>) -> Self {
        Self {
            name: name.into(),
            product_type,
            phases: Vec::new(),
            dependencies: Vec::new(),
            product: None,
            product_name: None,
        }
    }

    /// File name the target's product is expected to have.
    #[must_use]
    pub fn expected_product_name(&self) -> Option<String> {
        if let Some(name) = &self.product_name {
            return Some(name.clone());
        }
        self.product_type
            .map(|ty| ty.default_product_name(&self.name))
    }
}
