mod clevertap_test;
mod gamooga_test;
mod netcore_test;
mod resolver_test;
mod source_test;
mod support;
