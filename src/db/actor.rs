use crate::db::dump;
use crate::db::models::{DbTagProvider, ModuleRecord, ModuleRegistration, TagProvider};
use crate::db::schema::{
    CERTIFICATES_SEQ, DEVICESETTINGS, EULAS_SEQ, TAG_PROVIDER_ID_FLOOR, TAGPROVIDERSETTINGS_SEQ,
};
use crate::error::GwInitError;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug)]
pub enum ConfigDbMessage {
    /// Insert certificate / EULA rows for a module unless they already exist.
    RegisterModule(
        ModuleRecord,
        RpcReplyPort<Result<ModuleRegistration, GwInitError>>,
    ),

    /// Insert a tag provider unless one with the same name exists. Replies with the new id.
    RegisterTagProvider(TagProvider, RpcReplyPort<Result<Option<i64>, GwInitError>>),

    /// List tag providers ordered by id.
    ListTagProviders(RpcReplyPort<Result<Vec<DbTagProvider>, GwInitError>>),

    /// Distinct driver types present in the device table.
    ListDriverTypes(RpcReplyPort<Result<Vec<String>, GwInitError>>),

    /// Dump one table to a replayable SQL script.
    DumpTable(String, RpcReplyPort<Result<String, GwInitError>>),

    /// Replace one table with the contents of a dump script.
    RestoreTable(String, String, RpcReplyPort<Result<(), GwInitError>>),
}

/// Cloneable handle to the configuration database actor.
///
/// Every request runs to completion on its own connection before the next one starts, so
/// there is never more than one writer.
#[derive(Clone)]
pub struct ConfigDbHandle {
    actor: ActorRef<ConfigDbMessage>,
}

impl ConfigDbHandle {
    pub async fn register_module(
        &self,
        record: ModuleRecord,
    ) -> Result<ModuleRegistration, GwInitError> {
        ractor::call!(self.actor, ConfigDbMessage::RegisterModule, record).map_err(|e| {
            GwInitError::RactorError(format!("ConfigDb RegisterModule RPC failed: {e}"))
        })?
    }

    pub async fn register_tag_provider(
        &self,
        provider: TagProvider,
    ) -> Result<Option<i64>, GwInitError> {
        ractor::call!(self.actor, ConfigDbMessage::RegisterTagProvider, provider).map_err(|e| {
            GwInitError::RactorError(format!("ConfigDb RegisterTagProvider RPC failed: {e}"))
        })?
    }

    pub async fn list_tag_providers(&self) -> Result<Vec<DbTagProvider>, GwInitError> {
        ractor::call!(self.actor, ConfigDbMessage::ListTagProviders).map_err(|e| {
            GwInitError::RactorError(format!("ConfigDb ListTagProviders RPC failed: {e}"))
        })?
    }

    pub async fn list_driver_types(&self) -> Result<Vec<String>, GwInitError> {
        ractor::call!(self.actor, ConfigDbMessage::ListDriverTypes).map_err(|e| {
            GwInitError::RactorError(format!("ConfigDb ListDriverTypes RPC failed: {e}"))
        })?
    }

    pub async fn dump_table(&self, table: &str) -> Result<String, GwInitError> {
        ractor::call!(self.actor, ConfigDbMessage::DumpTable, table.to_string()).map_err(|e| {
            GwInitError::RactorError(format!("ConfigDb DumpTable RPC failed: {e}"))
        })?
    }

    pub async fn restore_table(&self, table: &str, script: String) -> Result<(), GwInitError> {
        ractor::call!(
            self.actor,
            ConfigDbMessage::RestoreTable,
            table.to_string(),
            script
        )
        .map_err(|e| GwInitError::RactorError(format!("ConfigDb RestoreTable RPC failed: {e}")))?
    }

    /// Stops the actor; outstanding handles start failing with `RactorError`.
    pub fn stop(&self) {
        self.actor.stop(None);
    }
}

struct ConfigDbState {
    database_path: PathBuf,
    connect_opts: SqliteConnectOptions,
}

impl ConfigDbState {
    async fn connect(&self) -> Result<SqliteConnection, GwInitError> {
        Ok(self.connect_opts.connect().await?)
    }
}

struct ConfigDbActor;

#[ractor::async_trait]
impl Actor for ConfigDbActor {
    type Msg = ConfigDbMessage;
    type State = ConfigDbState;
    type Arguments = PathBuf;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        database_path: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        // The gateway owns the file: never create it, never touch its journal mode.
        let connect_opts = SqliteConnectOptions::new()
            .filename(&database_path)
            .create_if_missing(false)
            .foreign_keys(false)
            .busy_timeout(Duration::from_secs(5));

        info!(path = %database_path.display(), "ConfigDbActor initialized");
        Ok(ConfigDbState {
            database_path,
            connect_opts,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ConfigDbMessage::RegisterModule(record, reply) => {
                let res = self.register_module(state, &record).await;
                let _ = reply.send(res);
            }
            ConfigDbMessage::RegisterTagProvider(provider, reply) => {
                let res = self.register_tag_provider(state, &provider).await;
                let _ = reply.send(res);
            }
            ConfigDbMessage::ListTagProviders(reply) => {
                let res = self.list_tag_providers(state).await;
                let _ = reply.send(res);
            }
            ConfigDbMessage::ListDriverTypes(reply) => {
                let res = self.list_driver_types(state).await;
                let _ = reply.send(res);
            }
            ConfigDbMessage::DumpTable(table, reply) => {
                let res = dump::dump_table(&state.database_path, &table).await;
                let _ = reply.send(res);
            }
            ConfigDbMessage::RestoreTable(table, script, reply) => {
                let res = self.restore_table(state, &table, &script).await;
                let _ = reply.send(res);
            }
        }
        Ok(())
    }
}

impl ConfigDbActor {
    /// One transaction per module. Dropping it on error rolls both tables back.
    async fn register_module(
        &self,
        state: &ConfigDbState,
        record: &ModuleRecord,
    ) -> Result<ModuleRegistration, GwInitError> {
        let thumbprint = hex::decode(&record.thumbprint).map_err(|e| {
            GwInitError::Certificate(format!("invalid thumbprint {}: {e}", record.thumbprint))
        })?;
        let crc = i64::from(record.license_crc);

        let mut conn = state.connect().await?;
        let mut tx = conn.begin().await?;
        let mut registration = ModuleRegistration::default();

        let cert_exists: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM CERTIFICATES WHERE lower(hex(THUMBPRINT)) = ?",
        )
        .bind(&record.thumbprint)
        .fetch_optional(&mut *tx)
        .await?;

        if cert_exists.is_none() {
            let cert_id: i64 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(CERTIFICATES_ID) + 1, 1) FROM CERTIFICATES",
            )
            .fetch_one(&mut *tx)
            .await?;
            sqlx::query(
                "INSERT INTO CERTIFICATES (CERTIFICATES_ID, THUMBPRINT, SUBJECTNAME) VALUES (?, ?, ?)",
            )
            .bind(cert_id)
            .bind(&thumbprint)
            .bind(&record.subject_name)
            .execute(&mut *tx)
            .await?;
            bump_sequence(&mut tx, CERTIFICATES_SEQ, cert_id).await?;
            info!(module_id = %record.module_id, cert_id, "Insert thumbprint");
            registration.certificate_id = Some(cert_id);
        }

        let eula_exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM EULAS WHERE MODULEID = ? AND CRC = ?")
                .bind(&record.module_id)
                .bind(crc)
                .fetch_optional(&mut *tx)
                .await?;

        if eula_exists.is_none() {
            let eula_id: i64 =
                sqlx::query_scalar("SELECT COALESCE(MAX(EULAS_ID) + 1, 1) FROM EULAS")
                    .fetch_one(&mut *tx)
                    .await?;
            sqlx::query("INSERT INTO EULAS (EULAS_ID, MODULEID, CRC) VALUES (?, ?, ?)")
                .bind(eula_id)
                .bind(&record.module_id)
                .bind(crc)
                .execute(&mut *tx)
                .await?;
            bump_sequence(&mut tx, EULAS_SEQ, eula_id).await?;
            info!(module_id = %record.module_id, eula_id, "Accepting EULA");
            registration.eula_id = Some(eula_id);
        }

        tx.commit().await?;
        conn.close().await?;
        Ok(registration)
    }

    async fn register_tag_provider(
        &self,
        state: &ConfigDbState,
        provider: &TagProvider,
    ) -> Result<Option<i64>, GwInitError> {
        let mut conn = state.connect().await?;
        let mut tx = conn.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT TAGPROVIDERSETTINGS_ID FROM TAGPROVIDERSETTINGS WHERE NAME = ?",
        )
        .bind(&provider.name)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(id) = existing {
            debug!(name = %provider.name, id, "tag provider already registered");
            tx.commit().await?;
            conn.close().await?;
            return Ok(None);
        }

        let next_id: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(TAGPROVIDERSETTINGS_ID) + 1, ?) FROM TAGPROVIDERSETTINGS",
        )
        .bind(TAG_PROVIDER_ID_FLOOR)
        .fetch_one(&mut *tx)
        .await?;
        let id = next_id.max(TAG_PROVIDER_ID_FLOOR);

        sqlx::query(
            r#"
            INSERT INTO TAGPROVIDERSETTINGS (
                TAGPROVIDERSETTINGS_ID, NAME, PROVIDERID, DESCRIPTION, ENABLED, TYPEID, ALLOWBACKFILL
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&provider.name)
        .bind(&provider.external_uuid)
        .bind(&provider.description)
        .bind(provider.enabled)
        .bind(&provider.type_id)
        .bind(provider.allow_backfill)
        .execute(&mut *tx)
        .await?;
        bump_sequence(&mut tx, TAGPROVIDERSETTINGS_SEQ, id).await?;

        tx.commit().await?;
        conn.close().await?;
        info!(name = %provider.name, id, "Inserted tag provider");
        Ok(Some(id))
    }

    async fn list_tag_providers(
        &self,
        state: &ConfigDbState,
    ) -> Result<Vec<DbTagProvider>, GwInitError> {
        let mut conn = state.connect().await?;
        let rows = sqlx::query_as::<_, DbTagProvider>(
            r#"
        SELECT TAGPROVIDERSETTINGS_ID, NAME, PROVIDERID, DESCRIPTION, ENABLED, TYPEID, ALLOWBACKFILL
        FROM TAGPROVIDERSETTINGS
        ORDER BY TAGPROVIDERSETTINGS_ID
        "#,
        )
        .fetch_all(&mut conn)
        .await?;
        conn.close().await?;
        Ok(rows)
    }

    async fn list_driver_types(&self, state: &ConfigDbState) -> Result<Vec<String>, GwInitError> {
        let mut conn = state.connect().await?;
        let types: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT DISTINCT TYPE FROM {DEVICESETTINGS} ORDER BY TYPE"
        ))
        .fetch_all(&mut conn)
        .await?;
        conn.close().await?;
        Ok(types)
    }

    async fn restore_table(
        &self,
        state: &ConfigDbState,
        table: &str,
        script: &str,
    ) -> Result<(), GwInitError> {
        let mut conn = state.connect().await?;
        let res = dump::restore_table(&mut conn, table, script).await;
        conn.close().await?;
        res?;
        info!(table, "Restored table");
        Ok(())
    }
}

/// Keeps the gateway's id sequence in step with rows inserted behind its back.
async fn bump_sequence(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    name: &str,
    value: i64,
) -> Result<(), GwInitError> {
    sqlx::query("UPDATE SEQUENCES SET val = ? WHERE name = ?")
        .bind(value)
        .bind(name)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Spawn the configuration database actor for the file at `database_path`.
pub async fn spawn(database_path: &Path) -> Result<ConfigDbHandle, GwInitError> {
    let (actor, _jh) = ractor::Actor::spawn(None, ConfigDbActor, database_path.to_path_buf())
        .await
        .map_err(|e| GwInitError::RactorError(format!("failed to spawn ConfigDbActor: {e}")))?;

    Ok(ConfigDbHandle { actor })
}
