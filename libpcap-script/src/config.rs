use std::io;

use crate::error::Error;

/// Configuration, stored as a TOML document
///
/// Entries are accessed by path: a key containing dots is split, and each part is
/// requested recursively (`live.snaplen` is the key `snaplen` of table `live`).
pub struct Config {
    value: toml::Value,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            value: toml::Value::Table(toml::map::Map::new()),
        }
    }
}

impl Config {
    fn get_value(&self, k: &str) -> Option<&toml::Value> {
        let mut item = &self.value;
        for key in k.split('.') {
            item = item.get(key)?;
        }
        Some(item)
    }

    /// Get an entry of type string by path
    pub fn get<T: AsRef<str>>(&self, k: T) -> Option<&str> {
        self.get_value(k.as_ref())?.as_str()
    }

    /// Get an entry of type integer by path
    pub fn get_usize<T: AsRef<str>>(&self, k: T) -> Option<usize> {
        self.get_value(k.as_ref())?
            .as_integer()
            .and_then(|i| usize::try_from(i).ok())
    }

    /// Get an entry of type boolean by path
    pub fn get_bool<T: AsRef<str>>(&self, k: T) -> Option<bool> {
        self.get_value(k.as_ref())?.as_bool()
    }

    /// Set an entry by path, creating intermediate tables if needed
    pub fn set<T: AsRef<str>, V: Into<toml::Value>>(&mut self, k: T, v: V) -> Result<(), Error> {
        let path = k.as_ref();
        let mut item = &mut self.value;
        let mut keys = path.split('.').peekable();
        while let Some(key) = keys.next() {
            let table = item
                .as_table_mut()
                .ok_or_else(|| Error::Config(format!("cannot set '{path}': '{key}' is not in a table")))?;
            if keys.peek().is_none() {
                table.insert(key.to_owned(), v.into());
                return Ok(());
            }
            item = table
                .entry(key.to_owned())
                .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
        }
        Err(Error::Config(format!("invalid configuration key '{path}'")))
    }

    /// Load configuration from input object. If keys are already present, they are overwritten
    pub fn load_config<R: io::Read>(&mut self, mut config: R) -> Result<(), io::Error> {
        let mut s = String::new();
        config.read_to_string(&mut s)?;
        match toml::from_str::<toml::Table>(&s) {
            Ok(table) => {
                self.value = toml::Value::Table(table);
                Ok(())
            }
            Err(e) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Load configuration failed: {e}"),
            )),
        }
    }
}
