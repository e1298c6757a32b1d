pub mod installer;
pub mod launcher;
pub mod metadata;
pub mod packages;
pub mod profile;

// Re-export commonly used types
pub use metadata::{CompatibilityWindow, GameVersionCatalog, GameVersionDescriptor};
pub use packages::{Package, PackageCatalog, PackageIdentity, PackageVersion};
pub use profile::{InstalledMod, Profile};
