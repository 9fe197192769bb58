use std::path::{Path, PathBuf};

use anyhow::Context;

use super::IamRoleConnector;

impl IamRoleConnector {
    /// Write the live document of every role under `subpath` into the repository at `prefix`.
    /// Existing files are kept unless `overwrite` is set. Returns the addresses written.
    pub async fn do_import(&self, prefix: &Path, subpath: &Path, overwrite: bool) -> Result<Vec<PathBuf>, anyhow::Error> {
        let mut imported = Vec::new();

        for addr in self.do_list(subpath).await? {
            let out_path = prefix.join(&addr);
            if out_path.exists() && !overwrite {
                tracing::info!("Skipping {:?}, already present", addr);
                continue;
            }

            let Some(output) = self.do_get(&addr).await? else {
                tracing::warn!("{:?} disappeared during import", addr);
                continue;
            };

            if let Some(parent) = out_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
            tokio::fs::write(&out_path, &output.resource_definition)
                .await
                .with_context(|| format!("Failed to write {:?}", out_path))?;

            tracing::info!("Imported {:?}", addr);
            imported.push(addr);
        }

        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use std::{path::Path, sync::Arc};

    use crate::{
        connector::tests::{connector, fake_role, role_path},
        testing::FakeIam,
    };

    #[tokio::test]
    async fn writes_documents_and_respects_existing_files() {
        let prefix = std::env::temp_dir().join(format!("aws-iam-role-connector-import-{}", std::process::id()));
        let c = connector(Arc::new(
            FakeIam::default()
                .with_role("web", fake_role())
                .with_role("worker", fake_role()),
        ));

        std::fs::create_dir_all(prefix.join("aws/iam/roles")).unwrap();
        std::fs::write(prefix.join(role_path("web")), "hand written").unwrap();

        let imported = c.do_import(&prefix, Path::new(""), false).await.unwrap();
        assert_eq!(imported, vec![role_path("worker")]);
        assert_eq!(std::fs::read_to_string(prefix.join(role_path("web"))).unwrap(), "hand written");

        let worker = std::fs::read_to_string(prefix.join(role_path("worker"))).unwrap();
        assert!(worker.contains("assume_role_policy_document"));

        let imported = c.do_import(&prefix, Path::new(""), true).await.unwrap();
        assert_eq!(imported.len(), 2);

        std::fs::remove_dir_all(&prefix).unwrap();
    }
}
