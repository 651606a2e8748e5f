//! Check command implementation.
//!
//! Validates runtime requirements and configuration.

use crate::config::{validate_effective_config, Config};
use crate::startup_checks;

/// Validates runtime requirements and configuration.
///
/// Returns whether every check passed.
pub fn command_check_requirements(config: &Config) -> bool {
    println!("🔍 Checking Runtime Requirements");
    println!("================================\n");

    let mut all_ok = true;

    println!("⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n🔌 Checking privileges and process connector...");
    let receive_timeout = config.listener_config().receive_timeout;
    match startup_checks::validate_requirements(true, receive_timeout) {
        Ok(_) => println!("   ✅ Process events can be received"),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All requirements met - ready to monitor");
    } else {
        println!("   ❌ Some checks failed - please review the errors above");
    }
    all_ok
}
