//! Module import bridge.
//!
//! Resolves a component's declared host module dependencies before its
//! first render. Components with no declared dependencies skip the host
//! round-trip entirely.

use crate::error::Result;
use crate::host::{HostScene, ModuleMap, ModuleSpec};

/// Resolves `request` through the host, keeping only the names the
/// component actually declared.
pub(crate) async fn resolve(
    scene: &dyn HostScene,
    kind: &str,
    request: ModuleSpec,
) -> Result<ModuleMap> {
    if request.is_empty() {
        return Ok(ModuleMap::new());
    }

    log::info!("importing modules for `{kind}`");
    let resolved = scene.import_modules(request.clone()).await?;

    let mut out = ModuleMap::new();
    for name in request.names() {
        if let Some(module) = resolved.get(name) {
            log::info!("attached `{name}` module to `{kind}`");
            out.insert(name.to_string(), module.clone());
        }
    }
    Ok(out)
}
