//! Key pair management, including saving generated private keys.

use std::io::{self, Write};

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir, fs_utf8::OpenOptions};
use tracing::{debug, info};

use crate::api::Ec2Api;
use crate::connection::{ConnectionParams, Connector};
use crate::error::Ec2Error;
use crate::types::FilterSet;

use super::{Ec2Module, remote_failure};

fn require_name(key_name: &str) -> Result<(), Ec2Error> {
    if key_name.trim().is_empty() {
        return Err(Ec2Error::validation("a key pair name must be specified"));
    }
    if key_name.contains(['/', '\\']) {
        return Err(Ec2Error::validation(format!(
            "key pair name {key_name:?} cannot contain path separators"
        )));
    }
    Ok(())
}

fn key_material_error(path: &Utf8Path, err: &io::Error) -> Ec2Error {
    Ec2Error::KeyMaterial {
        path: path.to_string(),
        message: err.to_string(),
    }
}

/// Opens `save_dir` and checks `file_name` is free.
fn prepare_key_file(save_dir: &Utf8Path, file_name: &str) -> Result<Dir, Ec2Error> {
    let path = save_dir.join(file_name);
    let dir = Dir::open_ambient_dir(save_dir, ambient_authority())
        .map_err(|err| key_material_error(save_dir, &err))?;
    let taken = dir
        .try_exists(file_name)
        .map_err(|err| key_material_error(&path, &err))?;
    if taken {
        return Err(Ec2Error::KeyMaterial {
            path: path.to_string(),
            message: String::from("file already exists"),
        });
    }
    Ok(dir)
}

fn write_key_file(dir: &Dir, path: &Utf8Path, file_name: &str, material: &str) -> Result<(), Ec2Error> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    let mut file = dir
        .open_with(file_name, &options)
        .map_err(|err| key_material_error(path, &err))?;
    file.write_all(material.as_bytes())
        .map_err(|err| key_material_error(path, &err))?;
    restrict_permissions(dir, file_name).map_err(|err| key_material_error(path, &err))
}

#[cfg(unix)]
fn restrict_permissions(dir: &Dir, file_name: &str) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = std::fs::Permissions::from_mode(0o600);
    dir.set_permissions(file_name, cap_std::fs::Permissions::from_std(permissions))
}

#[cfg(not(unix))]
fn restrict_permissions(_dir: &Dir, _file_name: &str) -> io::Result<()> {
    Ok(())
}

impl<C, S, G> Ec2Module<C, S, G>
where
    C: Connector,
{
    /// Returns the name and fingerprint of `key_name`, if registered.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Validation`] for a blank name,
    /// [`Ec2Error::Configuration`] when connecting fails, and
    /// [`Ec2Error::Remote`] when the provider rejects the call.
    pub async fn get_key(
        &self,
        key_name: &str,
        params: &ConnectionParams,
    ) -> Result<Option<(String, String)>, Ec2Error> {
        require_name(key_name)?;
        let api = self.connector.connect(params)?;
        let key_pair = api
            .get_key_pair(key_name)
            .await
            .map_err(|err| remote_failure("get_key_pair", err))?;
        debug!(key_name, found = key_pair.is_some(), "key pair lookup");
        Ok(key_pair.map(|found| (found.name, found.fingerprint)))
    }

    /// Generates a key pair and saves its private key to
    /// `<save_dir>/<key_name>.pem`, returning the material.
    ///
    /// The destination is checked before the key pair is created and an
    /// existing file is never overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::KeyMaterial`] when the file exists or cannot be
    /// written, [`Ec2Error::Remote`] when the provider rejects the call or
    /// returns no material, and [`Ec2Error::Validation`] for a bad name.
    pub async fn create_key(
        &self,
        key_name: &str,
        save_dir: &Utf8Path,
        params: &ConnectionParams,
    ) -> Result<String, Ec2Error> {
        require_name(key_name)?;
        let file_name = format!("{key_name}.pem");
        let path = save_dir.join(&file_name);
        let dir = prepare_key_file(save_dir, &file_name)?;

        let api = self.connector.connect(params)?;
        let key_pair = api
            .create_key_pair(key_name)
            .await
            .map_err(|err| remote_failure("create_key_pair", err))?;
        let material = key_pair.material.ok_or_else(|| {
            Ec2Error::Remote(crate::api::RemoteError::new(format!(
                "no private key material returned for {key_name}"
            )))
        })?;

        write_key_file(&dir, &path, &file_name, &material)?;
        info!(key_name, %path, "key pair created");
        Ok(material)
    }

    /// Registers an existing public key and returns its fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Validation`] for a blank name or key,
    /// [`Ec2Error::Configuration`] when connecting fails, and
    /// [`Ec2Error::Remote`] when the provider rejects the call.
    pub async fn import_key(
        &self,
        key_name: &str,
        public_key_material: &str,
        params: &ConnectionParams,
    ) -> Result<String, Ec2Error> {
        require_name(key_name)?;
        if public_key_material.trim().is_empty() {
            return Err(Ec2Error::validation("public key material must be provided"));
        }
        let api = self.connector.connect(params)?;
        let key_pair = api
            .import_key_pair(key_name, public_key_material)
            .await
            .map_err(|err| remote_failure("import_key_pair", err))?;
        Ok(key_pair.fingerprint)
    }

    /// Deletes `key_name`. The provider reports success for unknown names.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Validation`] for a blank name,
    /// [`Ec2Error::Configuration`] when connecting fails, and
    /// [`Ec2Error::Remote`] when the provider rejects the call.
    pub async fn delete_key(
        &self,
        key_name: &str,
        params: &ConnectionParams,
    ) -> Result<bool, Ec2Error> {
        require_name(key_name)?;
        let api = self.connector.connect(params)?;
        api.delete_key_pair(key_name)
            .await
            .map_err(|err| remote_failure("delete_key_pair", err))
    }

    /// Lists key pair names, optionally restricted to `key_names` and
    /// `filters`.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Configuration`] when connecting fails and
    /// [`Ec2Error::Remote`] when the provider rejects the call.
    pub async fn get_keys(
        &self,
        key_names: &[String],
        filters: &FilterSet,
        params: &ConnectionParams,
    ) -> Result<Vec<String>, Ec2Error> {
        let api = self.connector.connect(params)?;
        let key_pairs = api
            .describe_key_pairs(key_names, filters)
            .await
            .map_err(|err| remote_failure("describe_key_pairs", err))?;
        debug!(count = key_pairs.len(), %filters, "key pairs listed");
        Ok(key_pairs.into_iter().map(|key_pair| key_pair.name).collect())
    }
}
