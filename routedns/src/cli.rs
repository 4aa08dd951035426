// Copyright 2020 LEXUGE
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::path::PathBuf;
use structopt::StructOpt;

/// A stub resolver, caching proxy, and programmable router for DNS.
#[derive(StructOpt, Debug)]
#[structopt(name = "routedns")]
pub struct Opt {
    /// Path to the YAML configuration file.
    #[structopt(parse(from_os_str))]
    pub config: PathBuf,

    /// Verbosity: 0 = off, 1 = error, 2 = warn, 3 = info, 4 = debug,
    /// 5/6 = trace. Repeat `-v` to raise it, or pass a number directly.
    #[structopt(short, long, default_value = "3")]
    pub log_level: u8,
}

impl Opt {
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.log_level {
            0 => log::LevelFilter::Off,
            1 => log::LevelFilter::Error,
            2 => log::LevelFilter::Warn,
            3 => log::LevelFilter::Info,
            4 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
