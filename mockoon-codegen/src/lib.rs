use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use quote::quote_spanned;
use std::path::Path;

/// Runs a test against a mockoon server started from the given data file.
///
/// ```ignore
/// #[mockoon_test("data/demo.json", configure)]
/// fn hello_is_served(server: &MockoonServer) {
///     // ...
/// }
/// ```
///
/// The configuration function is optional. The test function may take the
/// running server as its only argument. The server is stopped whether the
/// test body passes or panics.
#[proc_macro_attribute]
pub fn mockoon_test(attrs: TokenStream, item: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(item as syn::ItemFn);
    let args = syn::parse_macro_input!(attrs as syn::AttributeArgs);

    if args.is_empty() || args.len() > 2 {
        return quote! {
            compile_error!("A data file and an optional configuration function should be passed to the macro");
        }
        .into();
    }

    let data_file = if let syn::NestedMeta::Lit(syn::Lit::Str(parsed_data_file)) = &args[0] {
        let data_file = parsed_data_file.value();
        if let Err(stream) = validate_data_file_path(&data_file, parsed_data_file.span()) {
            return stream.into();
        }
        data_file
    } else {
        return quote! {
            compile_error!("The first argument should be a string literal!");
        }
        .into();
    };

    let configure = match args.get(1) {
        None => quote! {},
        Some(syn::NestedMeta::Meta(syn::Meta::Path(function_path))) => {
            quote! { #function_path(&mut __mockoon_configuration); }
        }
        Some(_) => {
            return quote! {
                compile_error!("The second argument should be a configuration function!");
            }
            .into();
        }
    };

    let body_call = match input.sig.inputs.len() {
        0 => quote! { __mockoon_test_body() },
        1 => quote! { __mockoon_test_body(&__mockoon_server) },
        _ => {
            return quote_spanned! {input.sig.paren_token.span=>
                compile_error!("The test function should take at most one argument, the server");
            }
            .into();
        }
    };

    let attributes = &input.attrs;
    let visibility = &input.vis;
    let name = &input.sig.ident;

    let mut body = input.clone();
    body.attrs.clear();
    body.vis = syn::Visibility::Inherited;
    body.sig.ident = syn::Ident::new("__mockoon_test_body", Span::call_site());

    let output = quote! {
        #[test]
        #(#attributes)*
        #visibility fn #name() {
            #body

            let mut __mockoon_configuration = mockoon::MockoonConfiguration::new(#data_file);
            #configure
            let mut __mockoon_server = match mockoon::MockoonServer::new(__mockoon_configuration) {
                Ok(server) => server,
                Err(e) => panic!("Mockoon Error: {}", e),
            };
            if let Err(e) = __mockoon_server.start() {
                panic!("Mockoon Error: {}", e);
            }

            let __mockoon_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                #body_call
            }));
            __mockoon_server.stop();

            if let Err(e) = __mockoon_result {
                std::panic::resume_unwind(e);
            }
        }
    };

    TokenStream::from(output)
}

fn validate_data_file_path<P: AsRef<Path>>(
    path: P,
    span: Span,
) -> Result<(), proc_macro2::TokenStream> {
    if !path.as_ref().to_string_lossy().ends_with(".json") {
        return Err(quote_spanned! {span=>
            compile_error!("The path should point to a .json file!");
        });
    }

    Ok(())
}
