//! Gateway configuration tables touched by provisioning.
//!
//! The gateway owns this schema; only table/column names and the driver mapping live here.

pub const CERTIFICATES: &str = "CERTIFICATES";
pub const EULAS: &str = "EULAS";
pub const SEQUENCES: &str = "SEQUENCES";
pub const DEVICESETTINGS: &str = "DEVICESETTINGS";
pub const TAGPROVIDERSETTINGS: &str = "TAGPROVIDERSETTINGS";

pub const CERTIFICATES_SEQ: &str = "CERTIFICATES_SEQ";
pub const EULAS_SEQ: &str = "EULAS_SEQ";
pub const TAGPROVIDERSETTINGS_SEQ: &str = "TAGPROVIDERSETTINGS_SEQ";

/// Lowest id handed to a new tag provider; id 1 is reserved for the built-in provider.
pub const TAG_PROVIDER_ID_FLOOR: i64 = 2;

/// Device driver type (`DEVICESETTINGS.TYPE`) -> driver settings table.
const DRIVER_SETTINGS: &[(&str, &str)] = &[
    ("SimulatorDevice", "BOWERYSCADADEVICESETTINGS"),
    // Allen-Bradley
    ("CompactLogix", "COMPACTLOGIXDRIVERSETTINGS"),
    ("ControlLogix", "CONTROLLOGIXDRIVERSETTINGS"),
    ("LogixDriver", "LOGIXDRIVERSETTINGS"),
    ("MicroLogix", "MICROLOGIXDRIVERSETTINGS"),
    ("PLC5", "PLC5DRIVERSETTINGS"),
    ("SLC", "SLCDRIVERSETTINGS"),
    ("Dnp3Driver", "DNP3DRIVERSETTINGS"),
    // Modbus
    ("ModbusRtuOverTcp", "MODBUSTCPDRIVERSETTINGS"),
    ("ModbusTcp", "MODBUSTCPDRIVERSETTINGS"),
    // Omron
    (
        "com.inductiveautomation.FinsTcpDeviceType",
        "FINSTCPDEVICESETTINGS",
    ),
    (
        "com.inductiveautomation.FinsUdpDeviceType",
        "FINSUDPDEVICESETTINGS",
    ),
    ("com.inductiveautomation.omron.NjDriver", "NJDRIVERSETTINGS"),
    // Siemens
    ("S71200", "S71200DRIVERSETTINGS"),
    ("S71500", "S71500DRIVERSETTINGS"),
    ("S7300", "S7300DRIVERSETTINGS"),
    ("S7400", "S7400DRIVERSETTINGS"),
    ("TCPDriver", "TCPDRIVERSETTINGS"),
    ("UDPDriver", "UDPDRIVERSETTINGS"),
];

/// Settings table for a device driver type, `None` for an unknown driver.
pub fn driver_settings_table(driver_type: &str) -> Option<&'static str> {
    DRIVER_SETTINGS
        .iter()
        .find(|(driver, _)| *driver == driver_type)
        .map(|(_, table)| *table)
}

/// `"NAME"` with embedded quotes doubled.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `'text'` with embedded quotes doubled.
pub(crate) fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
