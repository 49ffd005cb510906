use crate::support::exit_with;
use dataspace_publish::{PublisherConfig, config_info, config_template, publisher_for};

pub fn run_template(name: String) {
    print!("{}", config_template(&name).unwrap_or_else(|e| exit_with(e)));
}

pub fn run_info(name: String) {
    let publisher = publisher_for(PublisherConfig::new(name.clone())).unwrap_or_else(|e| exit_with(e));
    let info = config_info(&name, publisher.consumes()).unwrap_or_else(|e| exit_with(e));
    print!("{info}");
}
