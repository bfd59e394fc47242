#![allow(dead_code)]

use axum::Router;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use url::Url;

/// The slice of the gateway configuration schema provisioning touches.
pub const CONFIG_DB_DDL: &str = r#"
CREATE TABLE CERTIFICATES (
    CERTIFICATES_ID INTEGER NOT NULL,
    THUMBPRINT BLOB,
    SUBJECTNAME VARCHAR(4096),
    CONSTRAINT PK_CERTIFICATES PRIMARY KEY (CERTIFICATES_ID)
);
CREATE TABLE EULAS (
    EULAS_ID INTEGER NOT NULL,
    MODULEID VARCHAR(4096),
    CRC BIGINT,
    CONSTRAINT PK_EULAS PRIMARY KEY (EULAS_ID)
);
CREATE TABLE SEQUENCES (
    name VARCHAR(255) NOT NULL,
    val BIGINT,
    PRIMARY KEY (name)
);
INSERT INTO SEQUENCES (name, val) VALUES
    ('CERTIFICATES_SEQ', 0),
    ('EULAS_SEQ', 0),
    ('TAGPROVIDERSETTINGS_SEQ', 0);
CREATE TABLE DEVICESETTINGS (
    DEVICESETTINGS_ID INTEGER NOT NULL,
    NAME VARCHAR(4096),
    TYPE VARCHAR(4096),
    DESCRIPTION VARCHAR(4096),
    ENABLED BOOLEAN,
    CONSTRAINT PK_DEVICESETTINGS PRIMARY KEY (DEVICESETTINGS_ID)
);
CREATE TABLE TAGPROVIDERSETTINGS (
    TAGPROVIDERSETTINGS_ID INTEGER NOT NULL,
    NAME VARCHAR(4096),
    PROVIDERID VARCHAR(4096),
    DESCRIPTION VARCHAR(4096),
    ENABLED BOOLEAN,
    TYPEID VARCHAR(4096),
    ALLOWBACKFILL BOOLEAN,
    CONSTRAINT PK_TAGPROVIDERSETTINGS PRIMARY KEY (TAGPROVIDERSETTINGS_ID)
);
CREATE TABLE BOWERYSCADADEVICESETTINGS (
    DEVICESETTINGSID INTEGER NOT NULL,
    HOSTNAME VARCHAR(4096),
    POLLRATE INTEGER,
    SCALE DOUBLE,
    PAYLOAD BLOB,
    CONSTRAINT PK_BOWERYSCADADEVICESETTINGS PRIMARY KEY (DEVICESETTINGSID)
);
"#;

pub async fn open(path: &Path) -> SqliteConnection {
    SqliteConnectOptions::new()
        .filename(path)
        .connect()
        .await
        .expect("open config db")
}

/// Creates `<dir>/config.idb` with the provisioning tables and returns its path.
pub async fn create_config_db(dir: &Path) -> PathBuf {
    let path = dir.join("config.idb");
    let mut conn = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .connect()
        .await
        .expect("create config db");
    sqlx::raw_sql(CONFIG_DB_DDL)
        .execute(&mut conn)
        .await
        .expect("apply ddl");
    conn.close().await.expect("close");
    path
}

pub async fn execute(path: &Path, sql: &str) {
    let mut conn = open(path).await;
    sqlx::raw_sql(sql).execute(&mut conn).await.expect("execute");
    conn.close().await.expect("close");
}

pub async fn count(path: &Path, table: &str) -> i64 {
    let mut conn = open(path).await;
    let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(&mut conn)
        .await
        .expect("count");
    conn.close().await.expect("close");
    n
}

pub async fn sequence(path: &Path, name: &str) -> i64 {
    let mut conn = open(path).await;
    let val: i64 = sqlx::query_scalar("SELECT val FROM SEQUENCES WHERE name = ?")
        .bind(name)
        .fetch_one(&mut conn)
        .await
        .expect("sequence");
    conn.close().await.expect("close");
    val
}

pub async fn spawn_test_server(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("http://{}", addr)).expect("valid base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

/// Self-signed certificate DER whose subject carries `common_name`.
pub fn certificate_der(common_name: &str) -> Vec<u8> {
    let mut params = rcgen::CertificateParams::new(vec!["modules.example.com".to_string()]);
    params.distinguished_name = rcgen::DistinguishedName::new();
    params
        .distinguished_name
        .push(rcgen::DnType::OrganizationName, "Bowery");
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, common_name);
    rcgen::Certificate::from_params(params)
        .expect("generate certificate")
        .serialize_der()
        .expect("serialize certificate")
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(content);
    out
}

// 1.2.840.113549.1.7.{1,2}
const OID_DATA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01];
const OID_SIGNED_DATA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x02];
// 1.3.14.3.2.26, 1.2.840.113549.1.1.1
const OID_SHA1: &[u8] = &[0x2b, 0x0e, 0x03, 0x02, 0x1a];
const OID_RSA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01];

/// Certificates-only PKCS#7 bundle, the shape `keytool -exportcert` style tools produce.
/// Certificates keep the order given.
pub fn pkcs7_bundle(certificates: &[Vec<u8>]) -> Vec<u8> {
    signed_bundle(certificates, &[])
}

/// PKCS#7 bundle with one SignerInfo naming `signer` by issuer and serial number.
pub fn pkcs7_bundle_signed_by(certificates: &[Vec<u8>], signer: &[u8]) -> Vec<u8> {
    use der::{Decode, Encode};

    let cert = x509_cert::Certificate::from_der(signer).expect("decode signer");
    let issuer = cert.tbs_certificate.issuer.to_der().expect("issuer der");
    let serial = cert
        .tbs_certificate
        .serial_number
        .to_der()
        .expect("serial der");
    let signer_info = tlv(
        0x30,
        &[
            tlv(0x02, &[0x01]),
            tlv(0x30, &[issuer, serial].concat()),
            tlv(0x30, &tlv(0x06, OID_SHA1)),
            tlv(0x30, &tlv(0x06, OID_RSA)),
            tlv(0x04, &[0u8; 8]),
        ]
        .concat(),
    );
    signed_bundle(certificates, &signer_info)
}

fn signed_bundle(certificates: &[Vec<u8>], signer_infos: &[u8]) -> Vec<u8> {
    let signed_data = tlv(
        0x30,
        &[
            tlv(0x02, &[0x01]),
            tlv(0x31, &[]),
            tlv(0x30, &tlv(0x06, OID_DATA)),
            tlv(0xa0, &certificates.concat()),
            tlv(0x31, signer_infos),
        ]
        .concat(),
    );
    tlv(
        0x30,
        &[tlv(0x06, OID_SIGNED_DATA), tlv(0xa0, &signed_data)].concat(),
    )
}

pub struct ModuleFixture {
    pub path: PathBuf,
    pub module_id: String,
    pub thumbprint: String,
    pub subject_name: String,
    pub license_crc: u32,
}

/// Writes `<dir>/<file_name>` as a module package signed by a fresh certificate.
pub fn write_module_package(
    dir: &Path,
    file_name: &str,
    module_id: &str,
    subject_name: &str,
    license: &str,
) -> ModuleFixture {
    use sha1::{Digest, Sha1};

    let cert = certificate_der(subject_name);
    let module_xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<modules>
  <module>
    <id>{module_id}</id>
    <name>Fixture</name>
    <version>1.0.0</version>
  </module>
</modules>"#
    );

    std::fs::create_dir_all(dir).expect("module dir");
    let path = dir.join(file_name);
    let file = std::fs::File::create(&path).expect("create module");
    let mut zip = zip::ZipWriter::new(file);
    let opts = zip::write::SimpleFileOptions::default();
    for (name, body) in [
        ("module.xml", module_xml.into_bytes()),
        ("license.html", license.as_bytes().to_vec()),
        ("certificates.p7b", pkcs7_bundle(&[cert.clone()])),
    ] {
        zip.start_file(name, opts).expect("start entry");
        zip.write_all(&body).expect("write entry");
    }
    zip.finish().expect("finish module");

    ModuleFixture {
        path,
        module_id: module_id.to_string(),
        thumbprint: hex::encode(Sha1::digest(&cert)),
        subject_name: subject_name.to_string(),
        license_crc: crc32fast::hash(license.as_bytes()),
    }
}
